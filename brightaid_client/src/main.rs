use std::path::PathBuf;

use brightaid_client::dialog::{
    DonationTarget, Donator, ExpenseForm, FundUtilizationDraft, PaymentRequest,
    ProjectUpdateDraft, TransparencyDraft,
};
use brightaid_client::identity::Login;
use brightaid_client::messaging::RequestDecision;
use brightaid_client::{
    utils, ApiClient, ClientConfig, DonorStore, IdentityStorage, NgoStore, ProjectFilter,
    RefreshOutcome, SchoolStore, UploadFile,
};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "BrightAid donation platform client", long_about = None)]
struct Args {
    /// Backend base URL
    #[arg(long, env = "BRIGHTAID_API_URL")]
    base_url: Option<String>,

    /// Identity storage file
    #[arg(long, env = "BRIGHTAID_STORAGE")]
    storage: Option<PathBuf>,

    /// Write JSON output to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Remember who is logged in
    Login {
        #[arg(long)]
        user_id: String,
        /// DONOR, NGO or SCHOOL
        #[arg(long)]
        user_type: String,
        #[arg(long)]
        donor_id: Option<i64>,
        #[arg(long)]
        ngo_id: Option<i64>,
        #[arg(long)]
        token: Option<String>,
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },
    /// Forget the stored identity
    Logout,
    /// Show the stored identity
    Whoami,
    #[command(subcommand)]
    Donor(DonorCommand),
    #[command(subcommand)]
    Ngo(NgoCommand),
    #[command(subcommand)]
    School(SchoolCommand),
    #[command(subcommand)]
    Messages(MessagesCommand),
    #[command(subcommand)]
    Requests(RequestsCommand),
    #[command(subcommand)]
    Payment(PaymentCommand),
    /// Post a progress update for a school project
    PostUpdate {
        #[arg(long)]
        project_id: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        progress: Option<f64>,
        #[arg(long)]
        amount_utilized: Option<f64>,
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Record an expense against a school project
    RecordExpense(ExpenseArgs),
}

#[derive(Subcommand, Debug)]
enum DonorCommand {
    /// Refresh and print the donor snapshot
    Refresh {
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Refresh and print dashboard figures
    Stats {
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Projects the donor has not donated to yet
    AvailableProjects {
        #[arg(long)]
        user_id: Option<String>,
    },
    /// List project type names
    ProjectTypes,
    /// Search school projects
    Filter {
        #[arg(long)]
        search: Option<String>,
        #[arg(long = "type")]
        project_type: Option<String>,
        #[arg(long)]
        funding: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum NgoCommand {
    Refresh {
        ngo_id: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum SchoolCommand {
    Refresh { school_id: i64 },
    Stats { school_id: i64 },
}

#[derive(Subcommand, Debug)]
enum MessagesCommand {
    /// List conversations
    List {
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Show a conversation and mark it read
    Show { conversation_id: i64 },
    Send { conversation_id: i64, text: String },
    Unread {
        #[arg(long)]
        user_id: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum RequestsCommand {
    List {
        #[arg(long)]
        school_id: i64,
    },
    Approve {
        request_id: i64,
        #[arg(long)]
        message: Option<String>,
    },
    Reject {
        request_id: i64,
        #[arg(long)]
        message: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum PaymentCommand {
    /// Start a hosted payment and print its URL
    Initiate {
        #[arg(long, default_value = "")]
        amount: String,
        #[arg(long, conflicts_with = "project_id")]
        student_id: Option<i64>,
        #[arg(long)]
        project_id: Option<i64>,
        #[arg(long)]
        project_title: Option<String>,
    },
}

#[derive(ClapArgs, Debug)]
struct ExpenseArgs {
    #[arg(long)]
    project_id: i64,
    #[arg(long)]
    amount: f64,
    #[arg(long)]
    purpose: String,
    #[arg(long)]
    donation_id: Option<i64>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    vendor: Option<String>,
    #[arg(long)]
    invoice: Option<String>,
    #[arg(long)]
    receipt: Option<PathBuf>,
    #[arg(long = "before")]
    before_photos: Vec<PathBuf>,
    #[arg(long = "after")]
    after_photos: Vec<PathBuf>,
    #[arg(long)]
    notes: Option<String>,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env();
    if let Some(url) = args.base_url.clone() {
        config = config.with_base_url(url);
    }
    if let Some(path) = args.storage.clone() {
        config = config.with_storage_path(path);
    }

    let api = ApiClient::new(&config)?;
    let identity = IdentityStorage::file(config.storage_path.clone());
    let output = args.output.as_deref();

    match args.command {
        Command::Login {
            user_id,
            user_type,
            donor_id,
            ngo_id,
            token,
            ttl_hours,
        } => {
            identity.remember_login(&Login {
                user_id,
                user_type,
                donor_id,
                ngo_id,
                token,
                ttl: chrono::Duration::hours(ttl_hours),
            })?;
        }
        Command::Logout => identity.clear()?,
        Command::Whoami => {
            let me = json!({
                "userId": identity.user_id(),
                "authUserId": identity.auth_user_id(),
                "donorId": identity.donor_id(),
                "ngoId": identity.ngo_id(),
            });
            utils::emit_json(&me, output)?;
        }
        Command::Donor(cmd) => run_donor(cmd, DonorStore::new(api, identity), output).await?,
        Command::Ngo(NgoCommand::Refresh { ngo_id }) => {
            let ngo_id = ngo_id
                .or_else(|| identity.ngo_id())
                .ok_or("no NGO id given or stored")?;
            let store = NgoStore::new(api);
            report_outcome(store.refresh(ngo_id).await);
            utils::emit_json(&store.snapshot(), output)?;
        }
        Command::School(cmd) => {
            let store = SchoolStore::new(api);
            match cmd {
                SchoolCommand::Refresh { school_id } => {
                    report_outcome(store.refresh(school_id).await);
                    utils::emit_json(&store.snapshot(), output)?;
                }
                SchoolCommand::Stats { school_id } => {
                    report_outcome(store.refresh(school_id).await);
                    let fund_stats = store.fund_stats(school_id).await.ok();
                    let utilization = fund_stats.as_ref().map(|s| s.utilization_percent());
                    let body = json!({
                        "summary": store.summary(),
                        "fundStats": fund_stats,
                        "utilizationPercent": utilization,
                    });
                    utils::emit_json(&body, output)?;
                }
            }
        }
        Command::Messages(cmd) => run_messages(cmd, &api, &identity, output).await?,
        Command::Requests(cmd) => match cmd {
            RequestsCommand::List { school_id } => {
                utils::emit_json(&api.requests_for_school(school_id).await?, output)?;
            }
            RequestsCommand::Approve { request_id, message } => {
                let user_id = identity.auth_user_id().ok_or("not logged in")?;
                let result = api
                    .respond_to_request(request_id, RequestDecision::Approve, message.as_deref(), &user_id)
                    .await?;
                utils::emit_json(&result, output)?;
            }
            RequestsCommand::Reject { request_id, message } => {
                let user_id = identity.auth_user_id().ok_or("not logged in")?;
                let result = api
                    .respond_to_request(request_id, RequestDecision::Reject, message.as_deref(), &user_id)
                    .await?;
                utils::emit_json(&result, output)?;
            }
        },
        Command::Payment(PaymentCommand::Initiate {
            amount,
            student_id,
            project_id,
            project_title,
        }) => {
            let donator = match (identity.donor_id(), identity.ngo_id()) {
                (Some(id), _) => Donator::Donor(id),
                (None, Some(id)) => Donator::Ngo(id),
                (None, None) => return Err("please login to make a donation".into()),
            };
            let target = if student_id.is_some() {
                DonationTarget::Student { student_id }
            } else if project_id.is_some() || project_title.is_some() {
                DonationTarget::Project {
                    project_id,
                    title: project_title,
                }
            } else {
                DonationTarget::General
            };
            let url = api
                .initiate_payment(&PaymentRequest {
                    donator,
                    target,
                    amount,
                })
                .await?;
            utils::emit_json(&json!({ "paymentUrl": url }), output)?;
        }
        Command::PostUpdate {
            project_id,
            title,
            description,
            progress,
            amount_utilized,
            images,
        } => {
            let mut files = Vec::with_capacity(images.len());
            for path in images {
                files.push(UploadFile::from_path(path).await?);
            }
            let draft = ProjectUpdateDraft {
                project_id,
                update_title: title,
                update_description: description,
                progress_percentage: progress,
                amount_utilized,
                images_urls: Vec::new(),
            };
            let created = api.post_project_update(draft, files).await?;
            utils::emit_json(&created, output)?;
        }
        Command::RecordExpense(expense) => {
            let available = api
                .available_donations(expense.project_id)
                .await
                .unwrap_or_default();
            let form = expense_form(expense).await?;
            let created = api.record_expense(form, &available).await?;
            utils::emit_json(&created, output)?;
        }
    }

    Ok(())
}

async fn run_donor(
    cmd: DonorCommand,
    store: DonorStore,
    output: Option<&std::path::Path>,
) -> CliResult<()> {
    match cmd {
        DonorCommand::Refresh { user_id } => {
            report_outcome(store.refresh(user_id.as_deref()).await);
            utils::emit_json(&store.snapshot(), output)?;
        }
        DonorCommand::Stats { user_id } => {
            report_outcome(store.refresh(user_id.as_deref()).await);
            let snapshot = store.snapshot();
            let body = json!({
                "summary": store.summary(),
                "backendStats": snapshot.stats,
                "uniqueSchoolsCount": snapshot.unique_schools_count,
            });
            utils::emit_json(&body, output)?;
        }
        DonorCommand::AvailableProjects { user_id } => {
            report_outcome(store.refresh(user_id.as_deref()).await);
            utils::emit_json(&store.available_projects(), output)?;
        }
        DonorCommand::ProjectTypes => {
            utils::emit_json(&store.fetch_project_types().await, output)?;
        }
        DonorCommand::Filter {
            search,
            project_type,
            funding,
        } => {
            let filter = ProjectFilter {
                search,
                project_type,
                funding,
            };
            utils::emit_json(&store.fetch_filtered_projects(&filter).await, output)?;
        }
    }
    Ok(())
}

async fn run_messages(
    cmd: MessagesCommand,
    api: &ApiClient,
    identity: &IdentityStorage,
    output: Option<&std::path::Path>,
) -> CliResult<()> {
    let current_user = |given: Option<String>| {
        given
            .or_else(|| identity.auth_user_id())
            .ok_or("no user id given or stored")
    };
    match cmd {
        MessagesCommand::List { user_id } => {
            let user_id = current_user(user_id)?;
            utils::emit_json(&api.conversations(&user_id).await?, output)?;
        }
        MessagesCommand::Show { conversation_id } => {
            let user_id = current_user(None)?;
            let messages = api.messages(conversation_id).await?;
            if let Err(e) = api.mark_read(conversation_id, &user_id).await {
                tracing::warn!(conversation_id, error = %e, "failed to mark conversation read");
            }
            utils::emit_json(&messages, output)?;
        }
        MessagesCommand::Send {
            conversation_id,
            text,
        } => {
            if text.trim().is_empty() {
                return Err("message text is empty".into());
            }
            let user_id = current_user(None)?;
            let sent = api.send_text(conversation_id, &user_id, &text).await?;
            utils::emit_json(&sent, output)?;
        }
        MessagesCommand::Unread { user_id } => {
            let user_id = current_user(user_id)?;
            let count = api.unread_count(&user_id).await;
            utils::emit_json(&json!({ "unread": count }), output)?;
        }
    }
    Ok(())
}

async fn expense_form(args: ExpenseArgs) -> CliResult<ExpenseForm> {
    let mut utilization = FundUtilizationDraft::new(args.project_id, args.amount, args.purpose.trim());
    utilization.donation_id = args.donation_id;
    utilization.detailed_description = args.description;
    utilization.vendor_name = args.vendor;
    utilization.bill_invoice_number = args.invoice;

    let receipt = match args.receipt {
        Some(path) => Some(UploadFile::from_path(path).await?),
        None => None,
    };
    let mut before_photos = Vec::new();
    for path in args.before_photos {
        before_photos.push(UploadFile::from_path(path).await?);
    }
    let mut after_photos = Vec::new();
    for path in args.after_photos {
        after_photos.push(UploadFile::from_path(path).await?);
    }

    Ok(ExpenseForm {
        utilization,
        transparency: TransparencyDraft {
            additional_notes: args.notes,
            ..TransparencyDraft::default()
        },
        receipt,
        before_photos,
        after_photos,
    })
}

fn report_outcome(outcome: RefreshOutcome) {
    match outcome {
        RefreshOutcome::Refreshed => {}
        RefreshOutcome::AlreadyInFlight => tracing::warn!("a refresh was already running"),
        RefreshOutcome::NoIdentity => tracing::warn!("no user id given or stored; run `login` first"),
        RefreshOutcome::NoProfile => tracing::warn!("the user has no profile for this role"),
    }
}
