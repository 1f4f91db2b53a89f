use clap::Args;
use clap::Parser;
use clap::Subcommand;

/// Probe an HTTP endpoint for CORS response headers and share the exact
/// request as a link.
///
/// CORS (Cross-Origin Resource Sharing) lets a server declare which origins,
/// methods and headers may access it from another origin. Use GET to check a
/// script, font or other static resource, OPTIONS to look at a preflight
/// response, and the other methods for anything else.
#[derive(Parser, Debug)]
#[command(version, about, long_about)]
pub struct Cli {
    /// Settings file; a missing default file is ignored
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Our own origin: the Origin sent when none is given, and the share link
    /// base
    #[arg(long, global = true, env = "CORS_PROBE_APP_ORIGIN")]
    pub app_origin: Option<String>,

    /// Print debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send the probe and report the result
    Test {
        #[command(flatten)]
        probe: ProbeArgs,

        /// Pass only when Access-Control-Allow-Origin matches the origin sent,
        /// instead of on any 200 response
        #[arg(long)]
        strict: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Copy the share link to the clipboard
        #[arg(long)]
        copy: bool,
    },

    /// Print the share link without sending anything
    Share {
        #[command(flatten)]
        probe: ProbeArgs,

        /// Copy the share link to the clipboard
        #[arg(long)]
        copy: bool,
    },

    /// Show the probe a share link describes
    Inspect {
        /// A share link or its query string
        link: String,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct ProbeArgs {
    /// Start from a share link (or its query string)
    #[arg(long, env = "CORS_PROBE_LINK")]
    pub link: Option<String>,

    /// URL to test
    #[arg(short, long)]
    pub url: Option<String>,

    /// Origin header to send
    #[arg(long)]
    pub origin: Option<String>,

    /// GET, POST, OPTIONS, PUT, PATCH or DELETE
    #[arg(short = 'X', long)]
    pub method: Option<String>,

    /// Extra request header as `Name: value`; repeatable
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// none, graphql or raw
    #[arg(long)]
    pub body_type: Option<String>,

    /// GraphQL query, sent as {"query": ...} when the body type is graphql
    #[arg(long)]
    pub graphql: Option<String>,

    /// Body sent verbatim when the body type is raw
    #[arg(long)]
    pub raw_body: Option<String>,
}
