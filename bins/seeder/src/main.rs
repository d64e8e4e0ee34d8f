//! Database seeder for Deptledger development and testing.
//!
//! Seeds a department, one user per role, the default categories and the
//! current fiscal year, then prints bearer tokens for each user. Safe to run
//! repeatedly.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;

use deptledger_core::access::{Actor, Role};
use deptledger_core::budget::CreateCategoryInput;
use deptledger_core::fiscal::FiscalYear;
use deptledger_db::entities::users;
use deptledger_db::repositories::{CreateUser, actor_of};
use deptledger_db::{
    CategoryRepository, DepartmentRepository, FiscalYearRepository, UserRepository,
};
use deptledger_shared::types::DepartmentId;
use deptledger_shared::{AppConfig, JwtConfig, JwtService};

/// Development department name.
const DEPARTMENT: &str = "Computer Science";

/// Default categories shared by every department.
const CATEGORIES: [(&str, &str); 5] = [
    ("Equipment", "Lab and office equipment"),
    ("Travel", "Conference and field travel"),
    ("Events", "Workshops, seminars and guest lectures"),
    ("Consumables", "Stationery and lab consumables"),
    ("Maintenance", "Repairs and annual maintenance contracts"),
];

/// One seeded user per role.
const USERS: [(&str, &str, Role); 3] = [
    ("Department Admin", "admin@deptledger.dev", Role::Admin),
    ("Head of Department", "hod@deptledger.dev", Role::Hod),
    ("Staff Member", "staff@deptledger.dev", Role::Staff),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    println!("Connecting to database...");
    let db = deptledger_db::connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    println!("Seeding department...");
    let departments = DepartmentRepository::new(db.clone());
    let department = match departments.find_by_name(DEPARTMENT).await? {
        Some(existing) => {
            println!("  Department already exists, skipping...");
            existing
        }
        None => departments.create(DEPARTMENT).await?,
    };
    let department_id = DepartmentId::from_uuid(department.id);

    println!("Seeding users...");
    let seeded = seed_users(&UserRepository::new(db.clone()), department_id).await?;

    println!("Seeding categories...");
    seed_categories(&CategoryRepository::new(db.clone())).await?;

    let admin = seeded
        .iter()
        .map(actor_of)
        .find(Actor::is_admin)
        .context("admin user was not seeded")?;
    let fiscal_year = FiscalYear::current();
    println!("Activating fiscal year {fiscal_year}...");
    FiscalYearRepository::new(db)
        .activate(&admin, fiscal_year)
        .await?;

    let jwt = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        access_token_expires_minutes: 24 * 60,
    });
    println!("\nDevelopment tokens (valid 24h):");
    for user in &seeded {
        let role = actor_of(user).role.as_str();
        let token = jwt.generate_access_token(user.id, user.department_id, role)?;
        println!("  {role:<6} {}  {token}", user.email);
    }

    println!("\nSeeding complete!");
    Ok(())
}

async fn seed_users(
    repo: &UserRepository,
    department_id: DepartmentId,
) -> anyhow::Result<Vec<users::Model>> {
    let mut seeded = Vec::with_capacity(USERS.len());
    for (full_name, email, role) in USERS {
        let user = if let Some(existing) = repo.find_by_email(email).await? {
            println!("  {email} already exists, skipping...");
            existing
        } else {
            let user = repo
                .create(CreateUser {
                    department_id,
                    full_name: full_name.to_string(),
                    email: email.to_string(),
                    role,
                })
                .await?;
            println!("  Created {} user: {email}", role.as_str());
            user
        };
        seeded.push(user);
    }
    Ok(seeded)
}

async fn seed_categories(repo: &CategoryRepository) -> anyhow::Result<()> {
    let existing = repo.list(true).await?;
    for (name, description) in CATEGORIES {
        if existing.iter().any(|c| c.name == name) {
            println!("  {name} already exists, skipping...");
            continue;
        }
        repo.create(CreateCategoryInput {
            name: name.to_string(),
            description: Some(description.to_string()),
        })
        .await?;
        println!("  Created category: {name}");
    }
    Ok(())
}
