use client::api::{HttpApi, ImageSource, PredictionApi};
use client::auth::models::{CredentialsError, validate_login, validate_registration};
use client::auth::{Session, TokenStore};
use client::render::RenderedPrediction;
use client::storage::LocalImage;
use client::storage::local_image::save_blob;
use client::{ClientConfig, ClientError, WorkflowController, WorkflowState};
use shared::{Credentials, PredictionResult, TaskId, UploadParams};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::{Cli, Commands};

struct Context {
    config: ClientConfig,
    api: Arc<HttpApi>,
}

impl Context {
    fn from_env() -> Result<Self, ClientError> {
        let config = ClientConfig::from_env()?;
        let session = match &config.token_file {
            Some(path) => Session::with_store(TokenStore::new(path))?,
            None => Session::in_memory(),
        };
        let api = HttpApi::new(config.api_url.clone(), session, config.request_timeout)?;
        log::debug!("Using backend at {}", config.api_url);
        Ok(Self {
            config,
            api: Arc::new(api),
        })
    }

    fn output_dir(&self, requested: Option<PathBuf>) -> PathBuf {
        requested.unwrap_or_else(|| self.config.output_dir.clone())
    }
}

pub async fn run(cli: Cli) -> Result<(), ClientError> {
    let ctx = Context::from_env()?;

    match cli.command {
        Commands::Login {
            username,
            password,
            token,
        } => match (token, username) {
            (Some(token), _) => {
                let user = ctx.api.login_with_token(token).await?;
                println!("Logged in as {}", user.username);
                Ok(())
            }
            (None, Some(username)) => {
                let password = resolve_password(password).await?;
                login(&ctx, Credentials { username, password }).await
            }
            (None, None) => Err(CredentialsError::Missing.into()),
        },
        Commands::Register { username, password } => {
            let password = resolve_password(password).await?;
            let credentials = Credentials { username, password };
            validate_registration(&credentials)?;
            let message = ctx.api.register(&credentials).await?;
            println!("{message}");
            Ok(())
        }
        Commands::Whoami => {
            let user = ctx.api.current_user().await?;
            match user.email {
                Some(email) => println!("{} <{}>", user.username, email),
                None => println!("{}", user.username),
            }
            Ok(())
        }
        Commands::Logout => {
            ctx.api.session().logout();
            println!("Logged out");
            Ok(())
        }
        Commands::Predict {
            image,
            params,
            output,
        } => {
            let image = LocalImage::load(&image)?;
            let stem = format!("{}_{}", file_stem(&image.file_name), image.fingerprint());
            let output = ctx.output_dir(output);
            predict(&ctx, image.into(), params.into(), &output, &stem).await
        }
        Commands::Repredict {
            name,
            params,
            output,
        } => {
            let output = ctx.output_dir(output);
            let stem = file_stem(&name);
            predict(&ctx, ImageSource::Stored { name }, params.into(), &output, &stem).await
        }
        Commands::Show { task_id, output } => {
            let task_id = TaskId::new(task_id);
            let result = ctx.api.get_prediction(&task_id).await?;
            let output = ctx.output_dir(output);
            let stem = format!("task_{task_id}");
            report(&result, &output, &stem)
        }
        Commands::Images => {
            let list = ctx.api.display_images().await?;
            if list.images.is_empty() {
                println!("No images found. Start uploading your images!");
            }
            for image in &list.images {
                println!(
                    "{:<40} {:>12} bytes  {}",
                    image.filename, image.size, image.upload_time
                );
            }
            Ok(())
        }
        Commands::FetchImage { name, output } => {
            let bytes = ctx.api.fetch_image(&name).await?;
            let path = save_blob(&ctx.output_dir(output), &name, &bytes)?;
            println!("Saved {}", path.display());
            Ok(())
        }
        Commands::Download { task_id, output } => {
            let task_id = TaskId::new(task_id);
            let bytes = ctx.api.download_results(&task_id).await?;
            let name = format!("results_{task_id}.zip");
            let path = save_blob(&ctx.output_dir(output), &name, &bytes)?;
            println!("Saved {}", path.display());
            Ok(())
        }
    }
}

async fn login(ctx: &Context, credentials: Credentials) -> Result<(), ClientError> {
    validate_login(&credentials)?;
    ctx.api.login(&credentials).await?;
    match ctx.api.current_user().await {
        Ok(user) => {
            println!("Logged in as {}", user.username);
            Ok(())
        }
        Err(e) => {
            ctx.api.session().logout();
            Err(e.into())
        }
    }
}

async fn predict(
    ctx: &Context,
    source: ImageSource,
    params: UploadParams,
    output: &Path,
    stem: &str,
) -> Result<(), ClientError> {
    let api: Arc<dyn PredictionApi> = ctx.api.clone();
    let mut controller = WorkflowController::with_poll_interval(api, ctx.config.poll_interval);
    controller.stage(source);
    controller.set_params(params);

    let task_id = controller.submit().await?;
    println!("Submitted, task id {task_id}");

    loop {
        let update = tokio::select! {
            state = controller.next_update() => Some(state.cloned()),
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(state) = update else {
            controller.cancel();
            return Err(ClientError::Interrupted);
        };

        match state {
            Some(WorkflowState::Polling {
                last_status: Some(status),
                polls,
                ..
            }) => println!("Task {task_id}: {status} (check #{polls})"),
            Some(WorkflowState::Succeeded { result, .. }) => {
                return report(&result, output, stem);
            }
            Some(WorkflowState::Failed {
                message,
                login_required,
            }) => {
                return Err(ClientError::PredictionFailed {
                    message,
                    login_required,
                });
            }
            Some(_) => {}
            None => return Ok(()),
        }
    }
}

fn report(result: &PredictionResult, output: &Path, stem: &str) -> Result<(), ClientError> {
    let rendered = RenderedPrediction::from_result(result)?;
    let written = rendered.write_to(output, stem)?;
    if let Some(message) = &result.message {
        println!("{message}");
    }
    println!(
        "Overlay: {} ({}x{})",
        written.overlay.display(),
        rendered.overlay.width,
        rendered.overlay.height
    );
    if let Some(chart) = &written.chart {
        println!("CDF chart: {}", chart.display());
    }
    if let Some(csv) = &written.cdf_csv {
        println!("CDF table: {}", csv.display());
    }
    println!("Model calibration: {}", rendered.calibration_message());
    Ok(())
}

async fn resolve_password(password: Option<String>) -> Result<String, ClientError> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("prediction")
        .to_string()
}
