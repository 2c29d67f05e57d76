//! Route-guard helpers.
//!
//! Thin glue for navigation layers: both guards defer their decision
//! until the first identity resolution has landed.

use crate::client::AuthClient;

/// Allow only guests (unauthenticated visitors), e.g. sign-in/sign-up
/// routes. Authenticated users should be redirected to the app instead.
pub async fn guest_guard(auth: &AuthClient) -> bool {
    auth.wait_until_ready().await;
    !auth.is_authenticated()
}

/// Allow only authenticated users.
pub async fn auth_guard(auth: &AuthClient) -> bool {
    auth.wait_until_ready().await;
    auth.is_authenticated()
}
