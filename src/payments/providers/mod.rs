pub mod card;
pub mod direct_wallet;
pub mod hosted_crypto;

pub use card::{CardCheckoutAdapter, CardConfig};
pub use direct_wallet::{DirectWalletAdapter, DirectWalletConfig};
pub use hosted_crypto::{HostedCryptoAdapter, HostedCryptoConfig};
