pub mod call;
pub mod flow;
pub mod report;
pub mod search;

pub use call::*;
pub use flow::*;
pub use report::*;
pub use search::*;
