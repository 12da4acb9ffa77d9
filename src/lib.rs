// Service configuration
pub mod config;

// Record model
pub mod record;

// Record persistence
pub mod store;

// Record operations (HTTP and real-time ingress)
pub mod gateway;

// Real-time change fan-out
pub mod notifier;

// HTTP and WebSocket APIs
pub mod api;

// WebSocket connection handling
pub mod subscription;
