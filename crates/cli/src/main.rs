use clap::{Parser, Subcommand};
use hans_core::{
    constants::DEFAULT_REGISTRY_DATA_DIR, pseudonym_salt_from_env_value, Actor, CoreConfig,
    CsvImportService, LocalSubscriptionIssuer, LocationService, ManagerService,
    NewCareProviderLocation, NewRegisteredManager, RecipientService,
};
use hans_types::{EmailAddress, NonEmptyText};
use hans_uuid::RecordUuid;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hans")]
#[command(about = "HANS management interface registry CLI")]
struct Cli {
    /// Registry data directory
    #[arg(long, default_value = DEFAULT_REGISTRY_DATA_DIR)]
    data_dir: PathBuf,

    /// Actor name recorded in record history
    #[arg(long, default_value = "HANS Administrator")]
    actor_name: String,

    /// Actor email recorded in record history
    #[arg(long, default_value = "admin@hans.nhs.uk")]
    actor_email: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a registered manager
    CreateManager {
        /// Given name
        given_name: String,
        /// Family name
        family_name: String,
        /// CQC registered-manager ID (unique)
        cqc_registered_manager_id: String,
    },
    /// Create a care provider location
    CreateLocation {
        /// Owning registered-manager UUID
        manager_uuid: String,
        /// Site name
        name: String,
        /// Contact email
        email: String,
        /// ODS site code
        ods_code: String,
        /// CQC location ID
        cqc_location_id: String,
    },
    /// List all care provider locations
    ListLocations,
    /// List the care recipients registered at a location
    ListRecipients {
        /// Care-provider-location UUID
        location_uuid: String,
    },
    /// Import care recipients from a CSV file into a location
    Import {
        /// Care-provider-location UUID
        location_uuid: String,
        /// Path to the CSV file
        csv_path: PathBuf,
    },
    /// Resolve a pseudonymized identifier to its location name
    Search {
        /// Pseudonymized care-recipient identifier (SHA-256 hex)
        pseudo_id: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let salt = pseudonym_salt_from_env_value(std::env::var("HANS_PSEUDONYM_SALT").ok())?;
    let cfg = Arc::new(CoreConfig::new(cli.data_dir.clone(), salt));
    let actor = Actor::new(&cli.actor_name, &cli.actor_email)?;

    match cli.command {
        Some(Commands::CreateManager {
            given_name,
            family_name,
            cqc_registered_manager_id,
        }) => {
            let service = ManagerService::new(cfg);
            let new = NewRegisteredManager {
                given_name: NonEmptyText::new(&given_name)?,
                family_name: NonEmptyText::new(&family_name)?,
                cqc_registered_manager_id: NonEmptyText::new(&cqc_registered_manager_id)?,
            };
            match service.create(&actor, new) {
                Ok(manager) => println!("Created registered manager with UUID: {}", manager.id),
                Err(e) => eprintln!("Error creating registered manager: {}", e),
            }
        }
        Some(Commands::CreateLocation {
            manager_uuid,
            name,
            email,
            ods_code,
            cqc_location_id,
        }) => {
            let service = LocationService::new(cfg);
            let new = NewCareProviderLocation {
                name: NonEmptyText::new(&name)?,
                email: EmailAddress::parse(&email)?,
                ods_code: NonEmptyText::new(&ods_code)?,
                cqc_location_id: NonEmptyText::new(&cqc_location_id)?,
                manager_id: RecordUuid::parse(&manager_uuid)?,
            };
            match service.create(&actor, new) {
                Ok(location) => {
                    println!("Created care provider location with UUID: {}", location.id)
                }
                Err(e) => eprintln!("Error creating care provider location: {}", e),
            }
        }
        Some(Commands::ListLocations) => {
            let service = LocationService::new(cfg);
            let locations = service.list();
            if locations.is_empty() {
                println!("No care provider locations found.");
            } else {
                for location in locations {
                    println!(
                        "ID: {}, Name: {}, ODS: {}, Manager: {}",
                        location.id, location.name, location.ods_code, location.manager_id
                    );
                }
            }
        }
        Some(Commands::ListRecipients { location_uuid }) => {
            let service = RecipientService::new(cfg);
            let location_id = RecordUuid::parse(&location_uuid)?;
            let recipients = service.list_for_location(&location_id);
            if recipients.is_empty() {
                println!("No care recipients found.");
            } else {
                for recipient in recipients {
                    println!(
                        "ID: {}, Pseudo ID: {}, Provider ref: {}",
                        recipient.id, recipient.nhs_number_hash, recipient.provider_reference_id
                    );
                }
            }
        }
        Some(Commands::Import {
            location_uuid,
            csv_path,
        }) => {
            let location_id = RecordUuid::parse(&location_uuid)?;
            let upload = std::fs::read(&csv_path)?;
            let subscriptions = LocalSubscriptionIssuer;
            let import = CsvImportService::new(cfg, &subscriptions);
            match import.import(&actor, &location_id, &upload) {
                Ok(summary) => println!("{}", summary.message()),
                Err(e) => eprintln!("Import rejected: {}", e),
            }
        }
        Some(Commands::Search { pseudo_id }) => {
            let recipients = RecipientService::new(cfg.clone());
            match recipients.find_by_pseudonym(&pseudo_id) {
                Some(recipient) => {
                    let locations = LocationService::new(cfg);
                    match locations.get(&recipient.location_id)? {
                        Some(location) => println!("{}", location.name),
                        None => eprintln!("No care provider location found."),
                    }
                }
                None => eprintln!("No care provider location found."),
            }
        }
        None => {
            println!("Use 'hans --help' for commands");
        }
    }

    Ok(())
}
