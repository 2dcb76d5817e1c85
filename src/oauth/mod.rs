// OAuth2 身份模块
//
// issuer 登记信息 + 系统账号 token 客户端（轮换的 refresh token 写回配置）

pub mod client;
pub mod provider;
pub mod token_store;
pub mod types;

pub use client::{OAuthSystemClient, RefreshTokenStore, TokenSource};
pub use provider::{ConfiguredIssuers, IssuerProvider};
pub use token_store::ConfigFileTokenStore;
pub use types::{AccessToken, EndpointKind, Issuer, TokenResponse, UserSession};
