pub mod argument_guard;
pub mod limits;

pub use argument_guard::ArgumentGuard;
pub use limits::ResourceLimits;
