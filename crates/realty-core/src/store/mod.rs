pub mod flow_store;

pub use flow_store::FlowStore;
