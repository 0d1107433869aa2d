use clap::{Args, Parser, Subcommand};
use shared::{Unit, UploadParams};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "segment")]
#[command(about = "Upload rock photographs for segmentation and fetch particle-size results", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the access token
    Login {
        #[arg(required_unless_present = "token")]
        username: Option<String>,

        /// Read from stdin when omitted
        #[arg(short, long, conflicts_with = "token")]
        password: Option<String>,

        /// Use a token issued elsewhere, e.g. by the OAuth login page
        #[arg(long, conflicts_with = "username")]
        token: Option<String>,
    },

    /// Create an account
    Register {
        username: String,

        #[arg(short, long)]
        password: Option<String>,
    },

    /// Show the logged-in user
    Whoami,

    /// Forget the stored token
    Logout,

    /// Upload an image and wait for its segmentation
    Predict {
        image: PathBuf,

        #[command(flatten)]
        params: PredictArgs,

        /// Directory for the overlay, chart and CDF table
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a new prediction on an image already stored on the server
    Repredict {
        name: String,

        #[command(flatten)]
        params: PredictArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render the stored prediction of an earlier task
    Show {
        task_id: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List uploaded images
    Images,

    /// Download a stored image
    FetchImage {
        name: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download the result archive of a task
    Download {
        task_id: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Real radius of the calibration object
    #[arg(long)]
    pub radius: Option<String>,

    /// Unit of the calibration radius (m, dm, cm, mm)
    #[arg(long, default_value = "cm")]
    pub unit: Unit,

    /// Confidence threshold (0-1)
    #[arg(long)]
    pub conf: Option<f32>,

    /// IoU threshold (0-1)
    #[arg(long)]
    pub iou: Option<f32>,
}

impl From<PredictArgs> for UploadParams {
    fn from(args: PredictArgs) -> Self {
        UploadParams {
            radius: args.radius,
            unit: args.unit,
            conf: args.conf,
            iou: args.iou,
        }
    }
}
