// Authentication module
// Manages the app and user token lifecycle

mod authority;
pub mod grant;
pub mod store;
pub mod types;

pub use authority::TokenAuthority;
pub use store::TokenStore;
pub use types::{
    AppCredential, Grant, GrantType, RefreshTokenPolicy, TokenPayload, TokenScope, UserCredential,
};
