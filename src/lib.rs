// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

pub mod api;
pub mod camera;
pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod footage;
pub mod paths;
pub mod planner;
pub mod session;
pub mod stats;
pub mod sync;
