//env
pub const SUBGRAPH_URL_NOT_SET: &str = "SUBGRAPH_URL not set!";
pub const TERMINAL_DAOS_INVALID: &str = "TERMINAL_DAOS is not a valid JSON list of DAOs";

//config
pub const CONFIG_READ_FAILED: &str = "Failed to read terminal config";
pub const CONFIG_PARSE_FAILED: &str = "Failed to parse terminal config";
pub const CONFIG_ALREADY_SET: &str = "Terminal config already initialized";

//subgraph
pub const SUBGRAPH_REQUEST_FAILED: &str = "Failed to query subgraph";
pub const SUBGRAPH_RESPONSE_INVALID: &str = "Subgraph returned an invalid response";

//cache
pub const CACHE_DIR_CREATE_FAILED: &str = "Failed to create cache directory";
