pub mod aggregator;
pub mod arrival;
pub mod config;
pub mod error;
pub mod fetch;
pub mod monitor;
pub mod normalize;
pub mod output;
pub mod parser;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
