// Domain-layer modules and shared errors/models
pub mod orchestrator {
    pub use crate::orchestrator::*;
}

pub mod planning {
    pub use crate::planning::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
