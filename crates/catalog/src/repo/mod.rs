mod builds;
mod galleries;
mod removals;

pub use self::builds::Builds;
pub use self::galleries::Galleries;
pub use self::removals::Removals;
