//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "fourcast")]
#[command(author, version, about = "Track up to four locations and their current temperature", long_about = None)]
pub struct Cli {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Look up the current weather for a city
    Search {
        /// City name to search for
        city: String,

        /// Save the match as a tracked location
        #[arg(long)]
        save: bool,
    },

    /// Save a location at an explicit coordinate
    Save {
        /// Display name for the location
        city: String,

        /// Latitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },

    /// Show saved locations with their last known readings
    List,

    /// Fetch fresh readings for every saved location
    Refresh {
        /// Keep refreshing every SECS seconds until Ctrl-C
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },

    /// Remove a saved location
    Delete {
        /// Location id as shown by `list`
        id: i64,
    },

    /// Current weather at the device location
    Here,
}
