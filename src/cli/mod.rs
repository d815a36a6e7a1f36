//! CLI commands for the decoder binary.
//!
//! ```bash
//! gec-decode-cli config show --json   # Effective config as JSON
//! gec-decode-cli config validate      # Exit 0 if valid
//! gec-decode-cli masks 5,6,0 30,4     # Print attention masks
//! ```

pub mod config_cmd;
pub mod masks_cmd;
