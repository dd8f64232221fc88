pub mod activation;
pub mod logging;
pub mod rpc_validator;
