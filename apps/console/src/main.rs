use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    composer::SUBMIT_FALLBACK_MESSAGE,
    config::normalize_base_url,
    load_settings,
    navigation::{section_for_path, visible_sections},
    sign_in, sign_out, ApiGateway, CatalogUpdate, ClientSettings, ComposerError, ComposerView,
    FileSessionPersistence, GatePolicy, Mode, OrderComposer, RenderDecision, RequestError,
    SessionGate, SessionStore, SignInError, SnapshotSource, SubmitOutcome, SupplierChange,
};
use shared::domain::{OrderId, ProductId, SupplierId};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scm", about = "Supply-chain back office: sign in and manage purchase orders")]
struct Cli {
    /// Service base URL, overriding scm.toml and the environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Directory holding the persisted session.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    /// Show what the session gate decides for a path.
    Navigate {
        path: String,
    },
    #[command(subcommand)]
    Order(OrderCommand),
}

#[derive(Subcommand, Debug)]
enum OrderCommand {
    Create {
        #[arg(long)]
        supplier: String,
        /// Line item as <product>:<quantity>; repeat for more lines.
        #[arg(long = "item", value_parser = parse_item)]
        items: Vec<ItemArg>,
    },
    Edit {
        id: String,
        /// Replace line <index> with <product>:<quantity>.
        #[arg(long = "set", value_parser = parse_set)]
        set: Vec<(usize, ItemArg)>,
        #[arg(long = "add", value_parser = parse_item)]
        add: Vec<ItemArg>,
        #[arg(long = "remove")]
        remove: Vec<usize>,
    },
}

#[derive(Debug, Clone)]
struct ItemArg {
    product: String,
    quantity: String,
}

fn parse_item(raw: &str) -> Result<ItemArg, String> {
    let (product, quantity) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected <product>:<quantity>, got '{raw}'"))?;
    Ok(ItemArg {
        product: product.trim().to_string(),
        quantity: quantity.to_string(),
    })
}

fn parse_set(raw: &str) -> Result<(usize, ItemArg), String> {
    let (index, item) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <index>=<product>:<quantity>, got '{raw}'"))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("invalid line index '{index}': {err}"))?;
    Ok((index, parse_item(item)?))
}

struct Console {
    settings: ClientSettings,
    session: SessionStore,
    gateway: Arc<ApiGateway>,
    gate: SessionGate,
}

impl Console {
    fn open(cli: &Cli) -> Result<Self> {
        let mut settings = load_settings();
        if let Some(url) = &cli.api_url {
            settings.api_base_url = normalize_base_url(url)?;
        }
        if let Some(dir) = &cli.data_dir {
            settings.data_dir = Some(dir.clone());
        }

        let session_path = session_file(&settings)?;
        debug!("console: session file {}", session_path.display());
        let session = SessionStore::restore(Arc::new(FileSessionPersistence::new(session_path)))
            .context("failed to restore session")?;
        let gateway = Arc::new(ApiGateway::new(
            settings.api_base_url.clone(),
            session.clone(),
        ));
        let gate = SessionGate::new(GatePolicy::from(&settings));
        Ok(Self {
            settings,
            session,
            gateway,
            gate,
        })
    }

    /// Runs the gate for `path`; only a rendered screen may proceed.
    async fn enter(&mut self, path: &str) -> Result<()> {
        match self.gate.evaluate(path, &self.session).await {
            RenderDecision::RenderScreen => Ok(()),
            RenderDecision::Navigate { to } if to == self.gate.policy().login_path => {
                bail!("not signed in; run `scm login <username> --password <password>` first")
            }
            RenderDecision::Navigate { to } => bail!("redirected to {to}"),
            RenderDecision::Placeholder => bail!("screen is not available yet"),
        }
    }

    async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let login_path = self.settings.login_path.clone();
        if let RenderDecision::Navigate { .. } =
            self.gate.evaluate(&login_path, &self.session).await
        {
            if let Some(identity) = self.session.identity().await {
                println!("already signed in as {} ({})", identity.subject, identity.role);
                return Ok(());
            }
        }

        let identity = match sign_in(&self.gateway, username, password).await {
            Ok(identity) => identity,
            Err(SignInError::Request(err)) => {
                bail!("sign-in failed: {}", non_blank(err.message(), "Login failed"))
            }
            Err(err) => return Err(err.into()),
        };
        println!("signed in as {} ({})", identity.subject, identity.role);
        print_sections(identity.role);
        Ok(())
    }

    async fn whoami(&mut self) -> Result<()> {
        let landing = self.settings.landing_path.clone();
        self.enter(&landing).await?;
        if let Some(identity) = self.session.identity().await {
            println!("{} ({})", identity.subject, identity.role);
            print_sections(identity.role);
        }
        Ok(())
    }

    async fn navigate(&mut self, path: &str) -> Result<()> {
        match self.gate.evaluate(path, &self.session).await {
            RenderDecision::RenderScreen => {
                let section = section_for_path(path)
                    .map(|section| section.label())
                    .unwrap_or("-");
                println!("render {path} (section: {section})");
            }
            RenderDecision::Navigate { to } => println!("redirect {path} -> {to}"),
            RenderDecision::Placeholder => println!("loading {path}"),
        }
        Ok(())
    }

    async fn create_order(&mut self, supplier: &str, items: &[ItemArg]) -> Result<()> {
        self.enter("/orders/new").await?;
        let composer = OrderComposer::new(self.gateway.clone(), Mode::Create);
        self.run(composer.initialize(None)).await?;

        let change = composer
            .change_supplier(Some(SupplierId::new(supplier)))
            .await?;
        if let SupplierChange::Catalog(CatalogUpdate::Failed(error)) = change {
            return Err(self.request_failed(error, None).await);
        }

        for (position, item) in items.iter().enumerate() {
            let index = if position == 0 {
                0
            } else {
                composer.add_item().await?
            };
            apply_item(&composer, index, item).await?;
        }
        self.submit(&composer).await
    }

    async fn edit_order(
        &mut self,
        id: &str,
        set: &[(usize, ItemArg)],
        add: &[ItemArg],
        remove: &[usize],
    ) -> Result<()> {
        self.enter(&format!("/orders/{id}/edit")).await?;
        let composer = OrderComposer::new(self.gateway.clone(), Mode::Edit(OrderId::new(id)));
        self.run(composer.initialize(None)).await?;

        let view = composer.view().await;
        if view.catalog.source == SnapshotSource::Failed {
            bail!(view
                .load_error
                .unwrap_or_else(|| "Failed to load products".to_string()));
        }
        print_draft(&view);

        for (index, item) in set {
            apply_item(&composer, *index, item).await?;
        }
        for item in add {
            let index = composer.add_item().await?;
            apply_item(&composer, index, item).await?;
        }
        let mut remove = remove.to_vec();
        remove.sort_unstable_by(|a, b| b.cmp(a));
        remove.dedup();
        for index in remove {
            composer.remove_item(index).await?;
        }
        self.submit(&composer).await
    }

    async fn submit(&self, composer: &OrderComposer) -> Result<()> {
        match composer.submit().await {
            Ok(SubmitOutcome::Submitted(order)) => {
                info!("console: order {} saved", order.id);
                println!("order {} saved ({} line items)", order.id, order.items.len());
                Ok(())
            }
            Ok(SubmitOutcome::AlreadyInFlight) => bail!("a submission is already in progress"),
            Err(ComposerError::Invalid(errors)) => {
                for error in &errors {
                    eprintln!("  {error}");
                }
                bail!("order not sent: {} field(s) need attention", errors.len())
            }
            Err(ComposerError::Request(err)) => {
                let shown = composer
                    .view()
                    .await
                    .last_error
                    .map(|failure| failure.display_message().to_string());
                Err(self.request_failed(err, shown).await)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn run<F>(&self, step: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<(), ComposerError>>,
    {
        match step.await {
            Ok(()) => Ok(()),
            Err(ComposerError::Request(err)) => Err(self.request_failed(err, None).await),
            Err(err) => Err(err.into()),
        }
    }

    /// A rejected token ends the session; a forbidden action does not.
    async fn request_failed(&self, err: RequestError, shown: Option<String>) -> anyhow::Error {
        match err.status() {
            Some(401) => {
                if let Err(clear_err) = sign_out(&self.session).await {
                    return anyhow!(clear_err).context("session expired and could not be cleared");
                }
                anyhow!("session expired; signed out, please sign in again")
            }
            Some(403) => anyhow!("permission denied: {}", err.message()),
            _ => anyhow!(shown.unwrap_or_else(|| {
                non_blank(err.message(), SUBMIT_FALLBACK_MESSAGE).to_string()
            })),
        }
    }
}

async fn apply_item(composer: &OrderComposer, index: usize, item: &ItemArg) -> Result<()> {
    composer
        .set_item_product(index, Some(ProductId::new(item.product.clone())))
        .await?;
    composer.set_item_quantity(index, &item.quantity).await?;
    Ok(())
}

fn print_draft(view: &ComposerView) {
    let supplier = view
        .draft
        .supplier_id
        .as_ref()
        .map(SupplierId::as_str)
        .unwrap_or("-");
    println!("supplier: {supplier}");
    for (index, item) in view.draft.items.iter().enumerate() {
        let label = item
            .product_id
            .as_ref()
            .and_then(|id| {
                view.product_options
                    .iter()
                    .find(|option| &option.id == id)
                    .map(|option| option.label.clone())
                    .or_else(|| Some(id.to_string()))
            })
            .unwrap_or_else(|| "-".to_string());
        println!("  [{index}] {label} x {}", item.quantity);
    }
}

fn print_sections(role: shared::domain::Role) {
    let labels: Vec<&str> = visible_sections(role)
        .iter()
        .map(|section| section.label())
        .collect();
    println!("sections: {}", labels.join(", "));
}

fn non_blank<'a>(message: &'a str, fallback: &'a str) -> &'a str {
    if message.trim().is_empty() {
        fallback
    } else {
        message
    }
}

fn session_file(settings: &ClientSettings) -> Result<PathBuf> {
    let root = match &settings.data_dir {
        Some(dir) => dir.clone(),
        None => dirs::data_local_dir()
            .ok_or_else(|| anyhow!("unable to resolve local app data dir"))?
            .join("scm_backoffice"),
    };
    Ok(root.join("session.json"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let mut console = Console::open(&cli)?;

    match &cli.command {
        Command::Login { username, password } => console.login(username, password).await?,
        Command::Logout => {
            sign_out(&console.session).await?;
            println!("signed out");
        }
        Command::Whoami => console.whoami().await?,
        Command::Navigate { path } => console.navigate(path).await?,
        Command::Order(OrderCommand::Create { supplier, items }) => {
            console.create_order(supplier, items).await?
        }
        Command::Order(OrderCommand::Edit {
            id,
            set,
            add,
            remove,
        }) => console.edit_order(id, set, add, remove).await?,
    }

    Ok(())
}
