//! # Rollbook - Attendance Server
//!
//! The main binary for Rollbook daily attendance.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for marking, submission and reporting
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------+
//! |           apps/rollbook (THE BINARY)        |
//! |                                             |
//! |   +-------------+        +-------------+    |
//! |   |    CLI      |        |  HTTP API   |    |
//! |   |   (clap)    |        |   (axum)    |    |
//! |   +------+------+        +------+------+    |
//! |          |                      |           |
//! |          +----------+-----------+           |
//! |                     v                       |
//! |             +---------------+               |
//! |             | rollbook-core |               |
//! |             |  (THE LOGIC)  |               |
//! |             +---------------+               |
//! +---------------------------------------------+
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! rollbook server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! rollbook -a t.okafor -r teacher mark -C 7B -S S1 -t present
//! rollbook -a t.okafor -r teacher submit -C 7B
//! rollbook records -C 7B
//! ```

use clap::Parser;
use rollbook::{cli, logging};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // ROLLBOOK_LOG_FORMAT=json enables machine-parseable output.
    logging::init_tracing();

    let cli = cli::Cli::parse();

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!(kind = e.kind(), "Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Rollbook startup banner.
fn print_banner() {
    println!(
        r#"
  ROLLBOOK  v{}
  daily attendance, audited
"#,
        env!("CARGO_PKG_VERSION")
    );
}
