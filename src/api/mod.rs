// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod internal_handlers {
    pub use crate::internal_handlers::*;
}

pub mod auth {
    pub use crate::auth::*;
}
