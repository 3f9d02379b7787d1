//! config-rs/lib.rs
//! Shared configuration utilities for the rescue planning services
//! Provides standardized functions for port/address management

use std::env;
use std::net::SocketAddr;

/// Load a `.env` file from the working directory (or a parent) if present
///
/// Returns the path that was loaded. A missing file is not an error.
pub fn load_dotenv() -> Option<std::path::PathBuf> {
    match dotenv::dotenv() {
        Ok(path) => {
            log::debug!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            log::warn!("Failed to load .env file: {}", e);
            None
        }
    }
}

/// Get service port from environment variables with proper fallback
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "EMERGENCY", "RAG")
/// * `default_port` - The default port to use if not specified in environment
///
/// # Returns
/// The port number to use for the service
pub fn get_service_port(service_name: &str, default_port: u16) -> u16 {
    let var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());
    match env::var(&var_name) {
        Ok(value) => value.trim().parse::<u16>().unwrap_or_else(|_| {
            log::warn!("Invalid port in {}, using default {}", var_name, default_port);
            default_port
        }),
        Err(_) => default_port,
    }
}

/// Create a SocketAddr for binding a service
///
/// `{NAME}_SERVICE_ADDR` may hold a full socket address (`0.0.0.0:8000`) or
/// a URL (`http://127.0.0.1:8000`); otherwise all interfaces on the service
/// port are used.
pub fn get_bind_address(service_name: &str, default_port: u16) -> SocketAddr {
    let var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    if let Ok(addr_str) = env::var(&var_name) {
        let trimmed = addr_str
            .trim()
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .trim_end_matches('/');

        match trimmed.parse::<SocketAddr>() {
            Ok(addr) => return addr,
            Err(_) => log::warn!("Invalid address format in {}, using default", var_name),
        }
    }

    let port = get_service_port(service_name, default_port);
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Get client connection address for connecting to a service
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "KNOWLEDGE_GRAPH", "CACHE")
/// * `default_port` - The default port to use if not specified in environment
/// * `host` - Optional host to use if not specified in environment (default: "localhost")
///
/// # Returns
/// A base URL for the client to connect to the service
pub fn get_client_address(service_name: &str, default_port: u16, host: Option<&str>) -> String {
    let addr_var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    // A full address override wins
    if let Ok(addr) = env::var(&addr_var_name) {
        let addr = addr.trim().trim_end_matches('/');
        if addr.starts_with("http://") || addr.starts_with("https://") {
            return addr.to_string();
        }
        return format!("http://{}", addr);
    }

    let port = get_service_port(service_name, default_port);
    let host = host.unwrap_or("localhost");
    format!("http://{}:{}", host, port)
}

/// Get service name for logging and monitoring
pub fn get_formatted_service_name(service_name: &str) -> String {
    match service_name.to_uppercase().as_str() {
        "EMERGENCY" => "emergency-service".to_string(),
        "KNOWLEDGE_GRAPH" => "knowledge-graph-service".to_string(),
        "GENERATION" => "generation-service".to_string(),
        "CACHE" => "cache-service".to_string(),
        "RAG" => "rag-service".to_string(),
        other => format!("{}-service", other.to_lowercase().replace('_', "-")),
    }
}

/// Service definition with port information
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    pub name: String,
    pub default_port: u16,
    pub display_name: String,
    /// Whether the planner needs this service to report itself healthy
    pub required: bool,
}

impl ServiceDefinition {
    /// Logical name used by clients, e.g. "knowledge_graph"
    pub fn logical_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Resolved client address for this service
    pub fn client_address(&self) -> String {
        get_client_address(&self.name, self.default_port, None)
    }
}

/// Get default port for a specific service
pub fn get_default_port(service_name: &str) -> u16 {
    match service_name.to_uppercase().as_str() {
        "EMERGENCY" => 8000,
        "KNOWLEDGE_GRAPH" => 8001,
        "GENERATION" => 8003,
        "CACHE" => 8004,
        "RAG" => 8008,
        _ => 8100, // Unknown services start at 8100
    }
}

fn definition(name: &str, display_name: &str, required: bool) -> ServiceDefinition {
    ServiceDefinition {
        name: name.to_string(),
        default_port: get_default_port(name),
        display_name: display_name.to_string(),
        required,
    }
}

/// Get the collaborators the planner calls
pub fn get_upstream_services() -> Vec<ServiceDefinition> {
    vec![
        definition("KNOWLEDGE_GRAPH", "Knowledge Graph Service", true),
        definition("RAG", "Retrieval Service", true),
        definition("GENERATION", "Generation Service", true),
        definition("CACHE", "Cache Service", false),
    ]
}

/// Get all service definitions, including the planner itself
pub fn get_all_services() -> Vec<ServiceDefinition> {
    let mut services = vec![definition("EMERGENCY", "Emergency Rescue Service", true)];
    services.extend(get_upstream_services());
    services
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_service_port() {
        std::env::set_var("PORTTEST_SERVICE_PORT", "9000");
        assert_eq!(get_service_port("PORTTEST", 8000), 9000);

        std::env::set_var("BADPORT_SERVICE_PORT", "not-a-port");
        assert_eq!(get_service_port("BADPORT", 8000), 8000);

        std::env::remove_var("UNSET_SERVICE_PORT");
        assert_eq!(get_service_port("UNSET", 8000), 8000);
    }

    #[test]
    fn test_get_client_address() {
        // Full address override
        std::env::set_var("ADDRTEST_SERVICE_ADDR", "http://example.com:9000/");
        assert_eq!(get_client_address("ADDRTEST", 8000, None), "http://example.com:9000");

        std::env::set_var("BAREADDR_SERVICE_ADDR", "rag.internal:8008");
        assert_eq!(get_client_address("BAREADDR", 8000, None), "http://rag.internal:8008");

        // Port override
        std::env::set_var("PORTONLY_SERVICE_PORT", "9100");
        assert_eq!(get_client_address("PORTONLY", 8000, None), "http://localhost:9100");

        // Defaults
        std::env::remove_var("NOTHING_SERVICE_ADDR");
        std::env::remove_var("NOTHING_SERVICE_PORT");
        assert_eq!(get_client_address("NOTHING", 8000, None), "http://localhost:8000");
        assert_eq!(
            get_client_address("NOTHING", 8000, Some("service.local")),
            "http://service.local:8000"
        );
    }

    #[test]
    fn test_get_bind_address() {
        std::env::set_var("BINDURL_SERVICE_ADDR", "http://127.0.0.1:8123");
        assert_eq!(get_bind_address("BINDURL", 8000), "127.0.0.1:8123".parse().unwrap());

        std::env::remove_var("BINDDEF_SERVICE_ADDR");
        std::env::remove_var("BINDDEF_SERVICE_PORT");
        assert_eq!(get_bind_address("BINDDEF", 8000), "0.0.0.0:8000".parse().unwrap());
    }

    #[test]
    fn test_service_catalogue() {
        assert_eq!(get_default_port("knowledge_graph"), 8001);
        assert_eq!(get_default_port("RAG"), 8008);
        assert_eq!(get_formatted_service_name("KNOWLEDGE_GRAPH"), "knowledge-graph-service");

        let upstream = get_upstream_services();
        let names: Vec<_> = upstream.iter().map(|s| s.logical_name()).collect();
        assert_eq!(names, vec!["knowledge_graph", "rag", "generation", "cache"]);
        assert_eq!(upstream.iter().filter(|s| s.required).count(), 3);
        assert_eq!(get_all_services()[0].default_port, 8000);
    }
}
