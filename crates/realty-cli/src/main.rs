//! Realty CLI: find rental listings, approve them, then call agents and
//! analyze locations for the approved ones.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use realty_cli::commands;
use realty_cli::commands::flow::Review;
use realty_core::models::SearchCriteria;
use realty_core::tools::voice::{InspectionCall, NegotiationCall};

/// Realty Agents: AI real estate research, calls and location analysis
#[derive(Parser)]
#[command(name = "realty", version, about = "Realty Agents: AI real estate workflow")]
pub struct Cli {
    /// Path to the SQLite database file [default: <data dir>/realty-agents/realty.db]
    #[arg(long, env = "REALTY_DB_PATH")]
    db: Option<PathBuf>,

    /// Directory that report files are written under
    #[arg(long, env = "REALTY_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory of crew YAML files overriding the built-in crews
    #[arg(long, env = "REALTY_CREW_DIR")]
    crew_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run and inspect real estate flows
    Flow {
        #[command(subcommand)]
        action: FlowAction,
    },

    /// Inspect, validate and run individual crews
    Crew {
        #[command(subcommand)]
        action: CrewAction,
    },

    /// Place and inspect voice calls
    Call {
        #[command(subcommand)]
        action: CallAction,
    },

    /// Extract structured data from a web page
    Extract {
        /// Page to extract from
        #[arg(long)]
        url: String,
        /// What to extract, in plain language
        #[arg(long)]
        goal: String,
        /// Use the stealth browser profile
        #[arg(long)]
        stealth: bool,
        /// Route through a proxy in this country (e.g. "US")
        #[arg(long)]
        proxy_country: Option<String>,
    },
}

#[derive(Subcommand)]
enum FlowAction {
    /// Start a new flow: research, approval, calls and location analysis
    Run {
        /// City or area to search
        #[arg(long)]
        location: String,
        /// Property type
        #[arg(long, default_value = "apartment")]
        property_type: String,
        #[arg(long)]
        bedrooms: Option<u32>,
        #[arg(long)]
        bathrooms: Option<u32>,
        /// Maximum rent
        #[arg(long)]
        max_price: Option<f64>,
        /// Rent frequency: monthly or yearly
        #[arg(long, default_value = "monthly")]
        rent_frequency: String,
        /// Free-text requirements
        #[arg(long)]
        requirements: Option<String>,
        /// Approval feedback to use instead of prompting (repeatable, e.g. --feedback retry --feedback prop_001)
        #[arg(long)]
        feedback: Vec<String>,
        /// Stop at the approval point; continue later with `flow resume`
        #[arg(long, conflicts_with = "feedback")]
        detach: bool,
    },
    /// Continue a flow that is awaiting approval
    Resume {
        /// Flow ID
        id: String,
        /// Approval feedback to use instead of prompting (repeatable)
        #[arg(long)]
        feedback: Vec<String>,
    },
    /// List stored flows
    List {
        /// Only flows in this phase (e.g. awaiting_approval)
        #[arg(long)]
        phase: Option<String>,
    },
    /// Show a stored flow as JSON
    Show {
        /// Flow ID
        id: String,
    },
    /// Delete a stored flow
    Delete {
        /// Flow ID
        id: String,
    },
    /// Print the flow state machine
    Plot,
}

#[derive(Subcommand)]
enum CrewAction {
    /// List available crews
    List,
    /// Validate crew definitions and their tool bindings
    Validate,
    /// Run a single crew
    Run {
        /// Crew name (research, call_agent, location_analyzer)
        name: String,
        /// Crew input as key=value (repeatable)
        #[arg(long = "input", short = 'i')]
        inputs: Vec<String>,
    },
}

#[derive(Subcommand)]
enum CallAction {
    /// Call a listing agent to book an inspection
    Inspect {
        /// Number to call (E.164)
        #[arg(long)]
        to: String,
        #[arg(long)]
        property_id: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        price: String,
        /// Comma-separated questions to ask
        #[arg(long, default_value = "")]
        questions: String,
        #[arg(long)]
        contact_name: Option<String>,
    },
    /// Call an owner to negotiate an acquisition
    Negotiate {
        /// Number to call (E.164)
        #[arg(long)]
        to: String,
        #[arg(long)]
        property_id: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        estimated_value: String,
        /// Price range the investor is willing to pay
        #[arg(long)]
        budget: String,
        #[arg(long)]
        contact_name: Option<String>,
    },
    /// Wait for a call to end and print the transcript
    Result {
        call_id: String,
        /// Seconds to wait before giving up
        #[arg(long)]
        max_wait: Option<u64>,
    },
    /// Check a call's current status
    Status { call_id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "realty_core=warn,realty_cli=info".into()),
        )
        .init();

    let db_path = cli.db.clone().unwrap_or_else(commands::default_db_path);

    let result = match cli.command {
        Some(Commands::Flow { action }) => match action {
            FlowAction::Run {
                location,
                property_type,
                bedrooms,
                bathrooms,
                max_price,
                rent_frequency,
                requirements,
                feedback,
                detach,
            } => {
                let criteria = SearchCriteria {
                    location,
                    property_type,
                    bedrooms,
                    bathrooms,
                    max_price,
                    rent_frequency,
                    additional_requirements: requirements,
                };
                let review = Review::from_args(feedback, detach);
                match commands::init_flow(cli.output_dir.as_deref(), cli.crew_dir.as_deref(), &db_path) {
                    Ok((runtime, store)) => {
                        commands::flow::run(
                            runtime.crews.clone(),
                            store,
                            &runtime.settings.output_dir,
                            criteria,
                            review,
                        )
                        .await
                    }
                    Err(e) => Err(e),
                }
            }
            FlowAction::Resume { id, feedback } => {
                match commands::init_flow(cli.output_dir.as_deref(), cli.crew_dir.as_deref(), &db_path) {
                    Ok((runtime, store)) => {
                        commands::flow::resume(
                            runtime.crews.clone(),
                            store,
                            &runtime.settings.output_dir,
                            &id,
                            Review::from_args(feedback, false),
                        )
                        .await
                    }
                    Err(e) => Err(e),
                }
            }
            FlowAction::List { phase } => match commands::open_store(&db_path) {
                Ok(store) => commands::flow::list(&store, phase.as_deref()).await,
                Err(e) => Err(e),
            },
            FlowAction::Show { id } => match commands::open_store(&db_path) {
                Ok(store) => commands::flow::show(&store, &id).await,
                Err(e) => Err(e),
            },
            FlowAction::Delete { id } => match commands::open_store(&db_path) {
                Ok(store) => commands::flow::delete(&store, &id).await,
                Err(e) => Err(e),
            },
            FlowAction::Plot => commands::flow::plot(),
        },

        Some(Commands::Crew { action }) => {
            match commands::Runtime::init(cli.output_dir.as_deref(), cli.crew_dir.as_deref()) {
                Ok(runtime) => match action {
                    CrewAction::List => commands::crew::list(runtime.crews.loader()),
                    CrewAction::Validate => {
                        let tools = realty_core::tools::ToolRegistry::standard(&runtime.settings);
                        commands::crew::validate(runtime.crews.loader(), &tools)
                    }
                    CrewAction::Run { name, inputs } => {
                        commands::crew::run(&runtime, &name, &inputs).await
                    }
                },
                Err(e) => Err(e),
            }
        }

        Some(Commands::Call { action }) => {
            let settings = commands::settings();
            match action {
                CallAction::Inspect {
                    to,
                    property_id,
                    address,
                    price,
                    questions,
                    contact_name,
                } => {
                    let call = InspectionCall {
                        to_number: to,
                        property_id,
                        property_address: address,
                        property_price: price,
                        user_questions: questions,
                        contact_name,
                    };
                    commands::call::inspect(&settings, call).await
                }
                CallAction::Negotiate {
                    to,
                    property_id,
                    address,
                    estimated_value,
                    budget,
                    contact_name,
                } => {
                    let call = NegotiationCall {
                        to_number: to,
                        property_id,
                        property_address: address,
                        estimated_value,
                        investor_budget: budget,
                        contact_name,
                    };
                    commands::call::negotiate(&settings, call).await
                }
                CallAction::Result { call_id, max_wait } => {
                    commands::call::result(&settings, &call_id, max_wait).await
                }
                CallAction::Status { call_id } => commands::call::status(&settings, &call_id).await,
            }
        }

        Some(Commands::Extract {
            url,
            goal,
            stealth,
            proxy_country,
        }) => {
            let settings = commands::settings();
            commands::extract::run(&settings, &url, &goal, stealth, proxy_country.as_deref()).await
        }

        None => {
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
