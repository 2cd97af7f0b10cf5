//! External service integrations.

pub mod wallet_client {
    pub use crate::wallet_client::*;
}

pub mod google_ads_client {
    pub use crate::google_ads_client::*;
}

pub mod google_ads_models {
    pub use crate::google_ads_models::*;
}

pub mod shopify_client {
    pub use crate::shopify_client::*;
}

pub mod internal_client {
    pub use crate::internal_client::*;
}
