//! Demo data for a fresh database.

use tracing::{info, warn};

use crate::db::models::{NewSection, NewStock, NewUser, ADMIN_ROLE};
use crate::db::operations::DbOperations;
use crate::error::{AppError, DatabaseError};
use crate::Result;

fn demo_users() -> Vec<NewUser> {
    vec![
        NewUser::new("Thomas Edison", "toby")
            .password("123toby")
            .pfp("toby.png")
            .kasm_server_needed(true)
            .role(ADMIN_ROLE),
        NewUser::new("Nicholas Tesla", "niko").password("123niko").pfp("niko.png"),
        NewUser::new("Alexander Graham Bell", "lex")
            .password("123lex")
            .pfp("lex.png")
            .kasm_server_needed(true),
        NewUser::new("Grace Hopper", "hop").password("123hop").pfp("hop.png"),
        NewUser::new("Fred Flintstone", "fred").pfp("fred.png").kasm_server_needed(true),
    ]
}

fn demo_sections() -> Vec<NewSection> {
    vec![
        NewSection::new("Computer Science A", "CSA"),
        NewSection::new("Computer Science Principles", "CSP"),
        NewSection::new("Engineering Robotics", "Robotics"),
        NewSection::new("Computer Science and Software Engineering", "CSSE"),
    ]
}

fn demo_stocks() -> Vec<NewStock> {
    [
        ("AAPL", "Apple Inc.", 190),
        ("MSFT", "Microsoft Corporation", 410),
        ("GOOGL", "Alphabet Inc.", 150),
        ("AMZN", "Amazon.com Inc.", 180),
        ("TSLA", "Tesla Inc.", 175),
    ]
    .into_iter()
    .map(|(symbol, company, price)| NewStock {
        symbol: symbol.to_string(),
        company: company.to_string(),
        quantity: 10_000,
        price,
    })
    .collect()
}

// Hopper's second CSSE enrollment exercises the duplicate guard.
const DEMO_ENROLLMENTS: &[(&str, &str)] = &[
    ("toby", "CSA"),
    ("toby", "CSP"),
    ("niko", "CSP"),
    ("niko", "Robotics"),
    ("lex", "Robotics"),
    ("hop", "CSSE"),
    ("hop", "CSSE"),
];

/// Load the demo users, sections, enrollments and stock catalog. Rows that
/// already exist are left as they are, so this can run on every startup.
pub async fn seed_demo_data(db: &DbOperations) -> Result<()> {
    for user in demo_users() {
        match db.create_user(&user).await {
            Ok(_) => {}
            Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
                warn!("Records exist, duplicate uid: {}", user.uid);
            }
            Err(e) => return Err(e),
        }
    }

    for section in demo_sections() {
        match db.create_section(&section).await {
            Ok(_) => {}
            Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
                warn!("Records exist, duplicate section: {}", section.abbreviation);
            }
            Err(e) => return Err(e),
        }
    }

    for (uid, abbreviation) in DEMO_ENROLLMENTS {
        let user = db.require_user(uid).await?;
        let section = db
            .get_section_by_abbreviation(abbreviation)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("section '{}'", abbreviation)))?;
        db.add_section(&user, &section).await?;
    }

    for stock in demo_stocks() {
        if db.get_stock_by_symbol(&stock.symbol).await?.is_none() {
            db.create_stock(&stock).await?;
        }
    }

    info!("Demo data loaded");
    Ok(())
}
