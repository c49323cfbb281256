pub mod in_memory;
pub mod prepare_env;
