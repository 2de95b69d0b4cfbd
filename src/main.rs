use std::{env, sync::Arc};

use anyhow::Result;
use dotenv::dotenv;
use serenity::all::{
    ApplicationId, Command, CommandInteraction, CreateAttachment, CreateCommand,
    CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage, EditAttachments,
    EditInteractionResponse, EditMessage, GatewayIntents, GuildId, Interaction, Message,
};
use serenity::{async_trait, model::gateway::Ready, prelude::*, Client};
use tracing::{error, info, warn};

use quarterly_bot::config::Config;
use quarterly_bot::service::command::mention as mention_cmd;
use quarterly_bot::service::command::news as news_cmd;
use quarterly_bot::service::command::quarterly as quarterly_cmd;
use quarterly_bot::service::finance::FinanceService;

struct Handler {
    finance: Arc<FinanceService>,
}

fn ping_command() -> CreateCommand {
    CreateCommand::new("ping").description("Simple ping command")
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        ping_command(),
        quarterly_cmd::register_command(),
        news_cmd::register_command(),
    ]
}

fn guild_ids_from_env() -> Vec<GuildId> {
    env::var("GUILD_IDS")
        .unwrap_or_else(|_| env::var("GUILD_ID").unwrap_or_default())
        .split(',')
        .filter_map(|id| id.trim().parse::<u64>().ok())
        .map(GuildId::new)
        .collect()
}

async fn register_global_commands(ctx: &Context) {
    for command in all_commands() {
        if let Err(err) = Command::create_global_command(&ctx.http, command).await {
            warn!("Failed to register global command: {}", err);
        }
    }
}

async fn defer(ctx: &Context, command: &CommandInteraction) {
    if let Err(err) = command
        .create_response(&ctx.http, CreateInteractionResponse::Defer(Default::default()))
        .await
    {
        warn!("Failed to defer /{}: {}", command.data.name, err);
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        // Guild commands register instantly; global ones can take up to an hour.
        #[cfg(debug_assertions)]
        let use_guild_commands = true;
        #[cfg(not(debug_assertions))]
        let use_guild_commands = false;

        if !use_guild_commands {
            register_global_commands(&ctx).await;
            info!(
                "{} is connected. [PRODUCTION MODE] Global commands registered (may take up to 1 hour).",
                ready.user.name
            );
            return;
        }

        let guild_ids = guild_ids_from_env();
        if guild_ids.is_empty() {
            info!(
                "{} is connected. [DEV MODE] No GUILD_IDS found, falling back to global commands.",
                ready.user.name
            );
            register_global_commands(&ctx).await;
            return;
        }

        for guild_id in guild_ids.iter() {
            for command in all_commands() {
                if let Err(err) = guild_id.create_command(&ctx.http, command).await {
                    warn!("Failed to register command in guild {}: {}", guild_id, err);
                }
            }
            info!("Guild commands registered for guild ID: {}", guild_id);
        }
        info!(
            "{} is connected. [DEV MODE] Guild commands registered instantly for {} server(s).",
            ready.user.name,
            guild_ids.len()
        );
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        match command.data.name.as_str() {
            "ping" => {
                let _ = command
                    .create_response(
                        &ctx.http,
                        CreateInteractionResponse::Message(
                            CreateInteractionResponseMessage::new().content("Pong!"),
                        ),
                    )
                    .await;
            }
            "quarterly" => {
                defer(&ctx, &command).await;

                let edit = match quarterly_cmd::handle(&command, &self.finance).await {
                    Ok(resp) => {
                        let mut edit = EditInteractionResponse::new().content(resp.content);
                        if let Some(bytes) = resp.image {
                            let attachment =
                                CreateAttachment::bytes(bytes, mention_cmd::CHART_FILENAME);
                            edit = edit.attachments(EditAttachments::new().add(attachment));
                        }
                        edit
                    }
                    Err(err) => EditInteractionResponse::new().content(format!("❌ {}", err)),
                };

                if let Err(err) = command.edit_response(&ctx.http, edit).await {
                    error!("Failed to send /quarterly response: {}", err);
                }
            }
            "news" => {
                defer(&ctx, &command).await;

                let content = match news_cmd::handle(&command, &self.finance).await {
                    Ok(msg) => msg,
                    Err(err) => format!("❌ {}", err),
                };

                if let Err(err) = command
                    .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
                    .await
                {
                    error!("Failed to send /news response: {}", err);
                }
            }
            _ => {
                let _ = command
                    .create_response(
                        &ctx.http,
                        CreateInteractionResponse::Message(
                            CreateInteractionResponseMessage::new()
                                .content("Command not implemented."),
                        ),
                    )
                    .await;
            }
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let bot_id = ctx.cache.current_user().id;
        let prefixes = [format!("<@{}>", bot_id), format!("<@!{}>", bot_id)];

        let content = msg.content.trim();
        let rest = match prefixes.iter().find_map(|p| content.strip_prefix(p)) {
            Some(r) => r.trim(),
            None => return,
        };

        if rest.is_empty() {
            let _ = msg.reply(&ctx.http, mention_cmd::help_text()).await;
            return;
        }

        // Placeholder first, then edit it with the real response.
        let mut placeholder = match msg
            .channel_id
            .send_message(&ctx.http, CreateMessage::new().content("Crunching the numbers…"))
            .await
        {
            Ok(m) => m,
            Err(err) => {
                let _ = msg.reply(&ctx.http, format!("❌ {}", err)).await;
                return;
            }
        };

        let edit = match mention_cmd::handle(rest, &self.finance).await {
            Ok(resp) => {
                let mut edit = EditMessage::new().content(resp.content);
                if let Some(attachment) = resp.attachment {
                    edit = edit.attachments(EditAttachments::new().add(attachment));
                }
                edit
            }
            Err(err) => EditMessage::new().content(format!("❌ {}", err)),
        };

        if let Err(err) = placeholder.edit(&ctx.http, edit).await {
            let _ = msg
                .reply(&ctx.http, format!("❌ failed to edit message: {}", err))
                .await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let token = env::var("DISCORD_TOKEN")?;
    let app_id_raw: u64 = env::var("APPLICATION_ID")?.parse()?;
    let app_id: ApplicationId = app_id_raw.into();

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    info!("Loading configuration...");
    let config = Config::from_env()?;

    info!("Initializing FinanceService...");
    let finance = Arc::new(FinanceService::new(&config)?);

    info!("Starting Discord client...");
    let mut client = Client::builder(token, intents)
        .application_id(app_id)
        .event_handler(Handler { finance })
        .await?;

    if let Err(why) = client.start().await {
        error!("Client error: {why}");
    }

    Ok(())
}
