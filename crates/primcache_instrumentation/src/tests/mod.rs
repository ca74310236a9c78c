mod config;
mod layer;
