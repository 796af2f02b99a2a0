use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fs;

const TOKEN_FILE: &str = ".photo_blog_token";

#[derive(Parser)]
#[command(name = "photo-blog-cli")]
#[command(about = "CLI for the photo blog API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "http://localhost:11111")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long)]
        web: Option<String>,
    },
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    Logout,
    Me,
    Posts,
    Post {
        #[arg(short, long)]
        id: String,
    },
    CreatePost {
        #[arg(short, long)]
        title: String,
        #[arg(short, long)]
        description: String,
        #[arg(short = 'm', long)]
        image_url: String,
        #[arg(short, long, default_value = "photography")]
        category: String,
        #[arg(long)]
        aperture: Option<String>,
        #[arg(long)]
        speed: Option<String>,
        #[arg(long)]
        iso: Option<String>,
    },
    UpdatePost {
        #[arg(short, long)]
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short = 'm', long)]
        image_url: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
    },
    DeletePost {
        #[arg(short, long)]
        id: String,
    },
    Like {
        #[arg(short, long)]
        id: String,
    },
    Comments {
        #[arg(short, long)]
        post: String,
    },
    Comment {
        #[arg(short, long)]
        post: String,
        #[arg(short, long)]
        text: String,
    },
    DeleteComment {
        #[arg(short, long)]
        id: String,
    },
    Account {
        #[arg(short, long)]
        id: String,
    },
    UpdateAccount {
        #[arg(short, long)]
        id: String,
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long)]
        web: Option<String>,
    },
    DeleteAccount {
        #[arg(short, long)]
        id: String,
    },
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
}

fn with_token(request: RequestBuilder) -> RequestBuilder {
    let token = fs::read_to_string(TOKEN_FILE).unwrap_or_default();
    request.bearer_auth(token.trim())
}

/// JSON object with only the fields that were given.
fn fields(pairs: Vec<(&str, Option<String>)>) -> Value {
    let map: Map<String, Value> = pairs
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), Value::String(v))))
        .collect();
    Value::Object(map)
}

async fn print(request: RequestBuilder) -> anyhow::Result<()> {
    let res = request.send().await?;
    println!("{}: {}", res.status(), res.text().await?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let url = cli.url;

    match cli.command {
        Commands::Register { username, email, password, image_url, web } => {
            print(client.post(format!("{url}/register")).json(&json!({
                "username": username,
                "email": email,
                "password": password,
                "image_url": image_url,
                "web": web,
            })))
            .await?;
        }
        Commands::Login { email, password } => {
            let res = client
                .post(format!("{url}/login"))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?;
            if res.status().is_success() {
                let body: LoginResponse = res.json().await?;
                fs::write(TOKEN_FILE, body.access_token)?;
                println!("Logged in. Token saved to {TOKEN_FILE}");
            } else {
                println!("Login failed: {}", res.text().await?);
            }
        }
        Commands::Logout => {
            let _ = fs::remove_file(TOKEN_FILE);
            println!("Logged out (token removed).");
        }
        Commands::Me => print(with_token(client.get(format!("{url}/me")))).await?,
        Commands::Posts => print(client.get(format!("{url}/posts"))).await?,
        Commands::Post { id } => print(client.get(format!("{url}/posts/{id}"))).await?,
        Commands::CreatePost { title, description, image_url, category, aperture, speed, iso } => {
            let body = fields(vec![
                ("title", Some(title)),
                ("description", Some(description)),
                ("image_url", Some(image_url)),
                ("category", Some(category)),
                ("aperture", aperture),
                ("speed", speed),
                ("iso", iso),
            ]);
            print(with_token(client.post(format!("{url}/posts"))).json(&body)).await?;
        }
        Commands::UpdatePost { id, title, description, image_url, category } => {
            let body = fields(vec![
                ("title", title),
                ("description", description),
                ("image_url", image_url),
                ("category", category),
            ]);
            print(with_token(client.put(format!("{url}/posts/{id}"))).json(&body)).await?;
        }
        Commands::DeletePost { id } => {
            print(with_token(client.delete(format!("{url}/posts/{id}")))).await?;
        }
        Commands::Like { id } => {
            print(with_token(client.put(format!("{url}/posts/{id}/like")))).await?;
        }
        Commands::Comments { post } => {
            print(client.get(format!("{url}/posts/{post}/comments"))).await?;
        }
        Commands::Comment { post, text } => {
            print(
                with_token(client.post(format!("{url}/posts/{post}/comments")))
                    .json(&json!({ "text": text })),
            )
            .await?;
        }
        Commands::DeleteComment { id } => {
            print(with_token(client.delete(format!("{url}/comments/{id}")))).await?;
        }
        Commands::Account { id } => print(client.get(format!("{url}/accounts/{id}"))).await?,
        Commands::UpdateAccount { id, username, email, password, image_url, web } => {
            let body = fields(vec![
                ("username", username),
                ("email", email),
                ("password", password),
                ("image_url", image_url),
                ("web", web),
            ]);
            print(with_token(client.put(format!("{url}/accounts/{id}"))).json(&body)).await?;
        }
        Commands::DeleteAccount { id } => {
            print(with_token(client.delete(format!("{url}/accounts/{id}")))).await?;
        }
    }

    Ok(())
}
