//! restcap: command line client for self-describing REST APIs
//!
//! Subcommands:
//! - `names`, `definition`, `definitions`: capability discovery
//! - `list`, `read`, `create`, `update`, `remove`: resource operations
//! - `link`, `unlink`: relationships between resources
//! - `refresh`: drop cached capabilities

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use miette::Result;
use restcap::normalizer::normalize_definition;
use restcap::{
    Client, ClientConfig, HttpResource, Identity, Link, PropertyValue, Range, ResourceProperty,
    Server, Specification,
};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parse boolean from environment variable, accepting common truthy values.
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true.
/// Accepts "0", "false", "no", "off", "" (case-insensitive) as false.
fn parse_bool_env(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(format!(
            "invalid boolean value '{}', expected 1/true/yes/on or 0/false/no/off",
            s
        )),
    }
}

/// Parse a listing filter: `field=value`, `field!=value`, `field>value`,
/// `field<value`, or `field~a,b` for membership.
fn parse_filter(s: &str) -> Result<Specification, String> {
    let (field, op, value) = ["!=", "=", ">", "<", "~"]
        .iter()
        .filter_map(|op| s.split_once(op).map(|(f, v)| (f.trim(), *op, v.trim())))
        .min_by_key(|(field, _, _)| field.len())
        .ok_or_else(|| format!("invalid filter '{s}', expected field=value"))?;

    if field.is_empty() {
        return Err(format!("filter '{s}' has no field"));
    }

    Ok(match op {
        "!=" => Specification::not_equals(field, value),
        ">" => Specification::greater_than(field, value),
        "<" => Specification::less_than(field, value),
        "~" => Specification::one_of(field, value.split(',').map(str::trim)),
        _ => Specification::equals(field, value),
    })
}

/// Parse a `key=value` link parameter.
fn parse_param(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("invalid parameter '{s}', expected key=value"))
}

#[derive(Parser)]
#[command(name = "restcap")]
#[command(about = "Client for self-describing REST APIs", long_about = None)]
struct Cli {
    /// Server URL
    #[arg(long, env = "RESTCAP_URL", global = true)]
    url: Option<String>,

    /// Directory for persisted capabilities (defaults to the platform cache dir)
    #[arg(long, env = "RESTCAP_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Always discover capabilities over the network
    #[arg(long, env = "RESTCAP_NO_CACHE", value_parser = parse_bool_env, default_value = "false", default_missing_value = "true", num_args = 0..=1, global = true)]
    no_cache: bool,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", global = true)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the resources the server exposes
    Names,

    /// Show the definition of one resource
    Definition {
        /// Resource name
        name: String,
    },

    /// Show every resource definition
    Definitions,

    /// List resource identities
    List {
        /// Resource name
        name: String,

        /// Filter such as `title=Hello`, `age>18` or `tag~a,b` (repeatable)
        #[arg(long = "where", value_parser = parse_filter)]
        filters: Vec<Specification>,

        /// Inclusive range `first-last`, for rangeable resources
        #[arg(long)]
        range: Option<Range>,
    },

    /// Read one resource
    Read {
        /// Resource name
        name: String,

        /// Resource identity
        id: String,
    },

    /// Create a resource from a JSON object
    Create {
        /// Resource name
        name: String,

        /// Properties as a JSON object
        json: String,
    },

    /// Replace a resource's properties from a JSON object
    Update {
        /// Resource name
        name: String,

        /// Resource identity
        id: String,

        /// Properties as a JSON object
        json: String,
    },

    /// Delete a resource
    Remove {
        /// Resource name
        name: String,

        /// Resource identity
        id: String,
    },

    /// Link a resource to another one
    Link {
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Remove a link between two resources
    Unlink {
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Forget cached capabilities and rediscover them
    Refresh,
}

#[derive(clap::Args)]
struct LinkArgs {
    /// Resource name
    name: String,

    /// Resource identity
    id: String,

    /// Target resource name
    target_name: String,

    /// Target resource identity
    target_id: String,

    /// Relationship
    rel: String,

    /// Link parameter `key=value` (repeatable)
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

impl LinkArgs {
    fn parts(self) -> restcap::Result<(String, Identity, Link)> {
        let identity = Identity::new(self.id)?;
        let link = Link::new(self.target_name, Identity::new(self.target_id)?, self.rel)?;
        let link = self
            .params
            .into_iter()
            .fold(link, |link, (key, value)| link.with_parameter(key, value));
        Ok((self.name, identity, link))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "restcap=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let url = cli
        .url
        .clone()
        .ok_or_else(|| miette::miette!("no server URL: pass --url or set RESTCAP_URL"))?;
    let cache_dir = if cli.no_cache {
        None
    } else {
        cli.cache_dir.clone().or_else(restcap::default_cache_dir)
    };
    debug!(%url, cache_dir = ?cache_dir, "starting");

    let config = ClientConfig::default()
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_cache_dir(cache_dir);
    let client = Client::new(config).map_err(|e| miette::miette!("{}", e))?;
    let server = client
        .server(&url)
        .map_err(|e| miette::miette!("{}", e))?;

    let output = run(server, cli.command)
        .await
        .map_err(|e| miette::miette!("{}", e))?;
    if let Some(output) = output {
        let rendered = serde_json::to_string_pretty(&output)
            .map_err(|e| miette::miette!("failed to render output: {}", e))?;
        println!("{rendered}");
    }
    Ok(())
}

async fn run(server: Arc<dyn Server>, command: Commands) -> restcap::Result<Option<serde_json::Value>> {
    match command {
        Commands::Names => {
            let names = server.capabilities().names().await?;
            Ok(Some(serde_json::to_value(names)?))
        }

        Commands::Definition { name } => {
            let definition = server.capabilities().get(&name).await?;
            Ok(Some(normalize_definition(&definition)))
        }

        Commands::Definitions => {
            let definitions = server.capabilities().definitions().await?;
            Ok(Some(serde_json::Value::Object(
                definitions
                    .iter()
                    .map(|(name, definition)| (name.clone(), normalize_definition(definition)))
                    .collect(),
            )))
        }

        Commands::List {
            name,
            filters,
            range,
        } => {
            let specification = filters.into_iter().reduce(Specification::and);
            let identities = server.all(&name, specification.as_ref(), range).await?;
            let identities: Vec<&str> = identities.iter().map(Identity::as_str).collect();
            Ok(Some(serde_json::to_value(identities)?))
        }

        Commands::Read { name, id } => {
            let resource = server.read(&name, &Identity::new(id)?).await?;
            Ok(Some(resource.to_json()))
        }

        Commands::Create { name, json } => {
            let identity = server.create(&resource_from_json(&name, &json)?).await?;
            Ok(Some(serde_json::json!({ "id": identity.as_str() })))
        }

        Commands::Update { name, id, json } => {
            server
                .update(&Identity::new(id)?, &resource_from_json(&name, &json)?)
                .await?;
            Ok(None)
        }

        Commands::Remove { name, id } => {
            server.remove(&name, &Identity::new(id)?).await?;
            Ok(None)
        }

        Commands::Link { link } => {
            let (name, identity, link) = link.parts()?;
            server.link(&name, &identity, &[link]).await?;
            Ok(None)
        }

        Commands::Unlink { link } => {
            let (name, identity, link) = link.parts()?;
            server.unlink(&name, &identity, &[link]).await?;
            Ok(None)
        }

        Commands::Refresh => {
            server.capabilities().refresh().await?;
            server.capabilities().names().await?;
            Ok(None)
        }
    }
}

/// Build a resource from a JSON object of untyped properties.
fn resource_from_json(name: &str, json: &str) -> restcap::Result<HttpResource> {
    let serde_json::Value::Object(entries) = serde_json::from_str(json)? else {
        return Err(restcap::Error::InvalidArgument(
            "resource properties must be a JSON object".to_string(),
        ));
    };

    let properties = entries
        .into_iter()
        .map(|(key, value)| ResourceProperty::new(key, PropertyValue::from(value)))
        .collect::<restcap::Result<Vec<_>>>()?;
    HttpResource::of(name, properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_bool_env() {
        assert_eq!(parse_bool_env("YES"), Ok(true));
        assert_eq!(parse_bool_env("off"), Ok(false));
        assert_eq!(parse_bool_env(""), Ok(false));
        assert!(parse_bool_env("maybe").is_err());
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(parse_filter("title=Hello"), Ok(Specification::equals("title", "Hello")));
        assert_eq!(parse_filter("a!=b"), Ok(Specification::not_equals("a", "b")));
        assert_eq!(parse_filter("age>18"), Ok(Specification::greater_than("age", "18")));
        assert_eq!(parse_filter("q=a>b"), Ok(Specification::equals("q", "a>b")));
        assert_eq!(parse_filter("tag~a, b"), Ok(Specification::one_of("tag", ["a", "b"])));
        assert!(parse_filter("nothing").is_err());
        assert!(parse_filter("=x").is_err());
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("role=editor"), Ok(("role".to_string(), "editor".to_string())));
        assert!(parse_param("role").is_err());
    }

    #[test]
    fn test_resource_from_json() {
        let resource = resource_from_json("posts", r#"{"title": "Hi", "views": 3}"#).unwrap();
        assert_eq!(resource.get("views"), Some(&PropertyValue::Int(3)));
        assert!(resource_from_json("posts", "[1, 2]").is_err());
    }

    #[test]
    fn test_cli_parses_list() {
        let cli = Cli::try_parse_from([
            "restcap", "--url", "http://example.com", "list", "posts", "--where", "a=1", "--where",
            "b>2", "--range", "0-9",
        ])
        .unwrap();
        let Commands::List { name, filters, range } = cli.command else {
            panic!("expected list");
        };
        assert_eq!(name, "posts");
        assert_eq!(filters.len(), 2);
        assert_eq!(range, Some(Range::new(0, 9).unwrap()));
    }
}
