pub mod capabilities;
pub mod cloud;
pub mod commands;
pub mod config;
pub mod deployment;
pub mod etcd;
pub mod executor;
pub mod fixtures;
pub mod k8s;
pub mod render;
pub mod telemetry;
