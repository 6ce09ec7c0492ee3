use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use leadscout_common::{Config, CoverageProfile};
use leadscout_engine::PipelineExecutor;
use leadscout_engine::writer::OrganizationProfile;
use leadscout_store::Repository;

#[derive(Parser)]
#[command(name = "leadscout", about = "Local-business lead-generation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a campaign (or run the connectivity self-test).
    Run {
        /// Campaign to execute.
        #[arg(long)]
        campaign_id: Option<Uuid>,
        /// Probe external dependencies and exit.
        #[arg(long)]
        test: bool,
        /// Cap on businesses per ZIP.
        #[arg(long)]
        max_per_zip: Option<u32>,
    },
    /// Create a draft campaign from a location and keywords.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        location: String,
        /// Comma-separated business keywords.
        #[arg(long)]
        keywords: String,
        #[arg(long, default_value = "balanced")]
        profile: String,
        /// Icebreaker template (specific_question, peer_social_proof,
        /// website_insight, problem_agitation, curiosity_hook, direct_value).
        #[arg(long)]
        template: Option<String>,
    },
    /// Run queued draft campaigns on an interval.
    Schedule {
        /// Interval such as "15m", "1h", or "90s".
        #[arg(long, default_value = "15m")]
        every: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    let repo = match Repository::connect(&config.database_url).await {
        Ok(repo) => repo,
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        }
    };
    if let Err(e) = repo.migrate().await {
        error!(error = %e, "Migrations failed");
        std::process::exit(1);
    }

    let executor = PipelineExecutor::new(config, repo, OrganizationProfile::from_env());

    let exit_code = match run(cli.command, &executor).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run(command: Command, executor: &PipelineExecutor) -> Result<i32> {
    match command {
        Command::Run {
            campaign_id,
            test,
            max_per_zip,
        } => {
            if test {
                return Ok(if executor.test_connections().await { 0 } else { 2 });
            }
            let Some(campaign_id) = campaign_id else {
                anyhow::bail!("--campaign-id is required unless --test is given");
            };
            let summary = executor.execute(campaign_id, max_per_zip).await?;
            info!(
                status = summary.status.as_str(),
                businesses = summary.businesses_found,
                emails = summary.emails_found,
                icebreakers = summary.icebreakers_generated,
                cost_usd = summary.total_cost,
                "Run finished"
            );
            Ok(if summary.status == leadscout_common::CampaignStatus::Completed {
                0
            } else {
                1
            })
        }
        Command::Create {
            name,
            location,
            keywords,
            profile,
            template,
        } => {
            let keywords: Vec<String> = keywords
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            let profile = CoverageProfile::parse(&profile)
                .ok_or_else(|| anyhow::anyhow!("Unknown profile: {profile}"))?;
            let campaign = executor
                .create(&name, &location, keywords, profile, template, None)
                .await?;
            info!(campaign_id = %campaign.id, "Created");
            println!("{}", campaign.id);
            Ok(0)
        }
        Command::Schedule { every } => {
            let interval = parse_interval(&every)?;
            info!(interval_secs = interval.as_secs(), "Scheduler starting");

            if !executor.test_connections().await {
                error!("Connectivity test failed, refusing to schedule");
                return Ok(2);
            }

            loop {
                run_next_draft(executor).await;

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = tokio::signal::ctrl_c() => {
                        info!("Scheduler stopped");
                        return Ok(0);
                    }
                }
            }
        }
    }
}

/// Claim and execute the oldest draft campaign, if any.
async fn run_next_draft(executor: &PipelineExecutor) {
    match executor.repo().next_draft_campaign().await {
        Ok(Some(campaign)) => {
            info!(campaign_id = %campaign.id, name = %campaign.name, "Scheduler picked campaign");
            match executor.execute(campaign.id, None).await {
                Ok(summary) => info!(
                    campaign_id = %campaign.id,
                    status = summary.status.as_str(),
                    "Scheduled run finished"
                ),
                Err(e) => warn!(campaign_id = %campaign.id, error = %e, "Scheduled run failed"),
            }
        }
        Ok(None) => info!("No draft campaigns waiting"),
        Err(e) => warn!(error = %e, "Failed to poll for draft campaigns"),
    }
}

/// Parse "15m" / "2h" / "90s" style intervals.
fn parse_interval(text: &str) -> Result<Duration> {
    let text = text.trim();
    let (value, unit) = text.split_at(text.len().saturating_sub(1));
    let number: u64 = value
        .parse()
        .map_err(|_| anyhow::anyhow!("Bad interval: {text}"))?;
    let seconds = match unit {
        "s" => number,
        "m" => number * 60,
        "h" => number * 3600,
        _ => anyhow::bail!("Bad interval unit in {text}; use s, m, or h"),
    };
    anyhow::ensure!(seconds > 0, "Interval must be positive");
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_parse_common_forms() {
        assert_eq!(parse_interval("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_interval("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_interval("90s").unwrap(), Duration::from_secs(90));
        assert!(parse_interval("15").is_err());
        assert!(parse_interval("0m").is_err());
    }
}
