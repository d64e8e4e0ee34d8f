//! Initial database migration.
//!
//! Creates enums, tables, unique keys, check constraints, indexes and the
//! append-only guard on `audit_logs`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: DEPARTMENTS & USERS
        // ============================================================
        db.execute_unprepared(DEPARTMENTS_SQL).await?;
        db.execute_unprepared(USERS_SQL).await?;
        db.execute_unprepared(DEPARTMENT_FISCAL_YEARS_SQL).await?;

        // ============================================================
        // PART 3: CATEGORY PLANNING
        // ============================================================
        db.execute_unprepared(CATEGORIES_SQL).await?;
        db.execute_unprepared(BUDGET_PLANS_SQL).await?;
        db.execute_unprepared(BUDGET_ALLOTMENTS_SQL).await?;
        db.execute_unprepared(EXPENSES_SQL).await?;

        // ============================================================
        // PART 4: FLEXIBLE BUDGETS
        // ============================================================
        db.execute_unprepared(BUDGETS_SQL).await?;
        db.execute_unprepared(BUDGET_BREAKDOWNS_SQL).await?;
        db.execute_unprepared(BUDGET_EXPENSES_SQL).await?;
        db.execute_unprepared(BUDGET_EXPENSE_BREAKDOWNS_SQL).await?;

        // ============================================================
        // PART 5: RECEIPTS & AUDIT
        // ============================================================
        db.execute_unprepared(RECEIPTS_SQL).await?;
        db.execute_unprepared(AUDIT_LOGS_SQL).await?;
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE user_role AS ENUM ('admin', 'hod', 'staff');

CREATE TYPE expense_status AS ENUM ('pending', 'approved', 'rejected');

CREATE TYPE plan_status AS ENUM ('draft', 'submitted');
";

const DEPARTMENTS_SQL: &str = r"
CREATE TABLE departments (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const USERS_SQL: &str = r"
CREATE TABLE users (
    id UUID PRIMARY KEY,
    department_id UUID NOT NULL REFERENCES departments(id),
    full_name VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL UNIQUE,
    role user_role NOT NULL DEFAULT 'staff',
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_users_department ON users(department_id);
";

const DEPARTMENT_FISCAL_YEARS_SQL: &str = r"
CREATE TABLE department_fiscal_years (
    department_id UUID NOT NULL REFERENCES departments(id),
    fiscal_year VARCHAR(7) NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT FALSE,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (department_id, fiscal_year),
    CONSTRAINT chk_dfy_label CHECK (fiscal_year ~ '^[0-9]{4}-[0-9]{2}$')
);

-- Activation rewrites is_active for every row of a department in one UPDATE
CREATE INDEX idx_dfy_active ON department_fiscal_years(department_id) WHERE is_active;
";

const CATEGORIES_SQL: &str = r"
CREATE TABLE categories (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL UNIQUE,
    description TEXT,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const BUDGET_PLANS_SQL: &str = r"
CREATE TABLE budget_plans (
    id UUID PRIMARY KEY,
    department_id UUID NOT NULL REFERENCES departments(id),
    category_id UUID NOT NULL REFERENCES categories(id),
    fiscal_year VARCHAR(7) NOT NULL,
    proposed_amount NUMERIC(19, 4) NOT NULL,
    justification TEXT,
    status plan_status NOT NULL DEFAULT 'draft',
    created_by UUID NOT NULL REFERENCES users(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT chk_plan_amount CHECK (proposed_amount >= 0),
    CONSTRAINT uq_budget_plans_key UNIQUE (department_id, category_id, fiscal_year)
);
";

const BUDGET_ALLOTMENTS_SQL: &str = r"
CREATE TABLE budget_allotments (
    id UUID PRIMARY KEY,
    department_id UUID NOT NULL REFERENCES departments(id),
    category_id UUID NOT NULL REFERENCES categories(id),
    fiscal_year VARCHAR(7) NOT NULL,
    allotted_amount NUMERIC(19, 4) NOT NULL,
    notes TEXT,
    approved_by UUID NOT NULL REFERENCES users(id),
    approved_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT chk_allotment_amount CHECK (allotted_amount >= 0),
    CONSTRAINT uq_budget_allotments_key UNIQUE (department_id, category_id, fiscal_year)
);
";

const EXPENSES_SQL: &str = r"
CREATE TABLE expenses (
    id UUID PRIMARY KEY,
    department_id UUID NOT NULL REFERENCES departments(id),
    category_id UUID NOT NULL REFERENCES categories(id),
    event_id UUID,
    vendor VARCHAR(255) NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    expense_date DATE NOT NULL,
    description TEXT,
    status expense_status NOT NULL DEFAULT 'pending',
    created_by UUID NOT NULL REFERENCES users(id),
    approved_by UUID REFERENCES users(id),
    approved_at TIMESTAMPTZ,
    approval_notes TEXT,
    rejection_reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT chk_expense_amount CHECK (amount > 0),
    CONSTRAINT chk_expense_rejection CHECK (status <> 'rejected' OR rejection_reason IS NOT NULL)
);

CREATE INDEX idx_expenses_spend
    ON expenses(department_id, category_id, expense_date)
    WHERE status = 'approved';
CREATE INDEX idx_expenses_listing ON expenses(department_id, created_at DESC);
";

const BUDGETS_SQL: &str = r"
CREATE TABLE budgets (
    id UUID PRIMARY KEY,
    department_id UUID NOT NULL REFERENCES departments(id),
    category_id UUID REFERENCES categories(id),
    name VARCHAR(255) NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    source VARCHAR(255),
    payment_method VARCHAR(100),
    budget_date DATE NOT NULL,
    fiscal_year VARCHAR(7) NOT NULL,
    created_by UUID NOT NULL REFERENCES users(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT chk_budget_amount CHECK (amount > 0)
);

CREATE INDEX idx_budgets_department_fy ON budgets(department_id, fiscal_year);
";

const BUDGET_BREAKDOWNS_SQL: &str = r"
CREATE TABLE budget_breakdowns (
    id UUID PRIMARY KEY,
    budget_id UUID NOT NULL REFERENCES budgets(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    payment_method VARCHAR(100),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT chk_budget_breakdown_amount CHECK (amount > 0)
);

CREATE INDEX idx_budget_breakdowns_budget ON budget_breakdowns(budget_id);
";

const BUDGET_EXPENSES_SQL: &str = r"
CREATE TABLE budget_expenses (
    id UUID PRIMARY KEY,
    department_id UUID NOT NULL REFERENCES departments(id),
    budget_id UUID REFERENCES budgets(id),
    category_id UUID REFERENCES categories(id),
    vendor VARCHAR(255) NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    expense_date DATE NOT NULL,
    description TEXT,
    status expense_status NOT NULL DEFAULT 'pending',
    created_by UUID NOT NULL REFERENCES users(id),
    approved_by UUID REFERENCES users(id),
    approved_at TIMESTAMPTZ,
    approval_notes TEXT,
    rejection_reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT chk_budget_expense_amount CHECK (amount > 0),
    CONSTRAINT chk_budget_expense_target CHECK (budget_id IS NOT NULL OR category_id IS NOT NULL),
    CONSTRAINT chk_budget_expense_rejection CHECK (status <> 'rejected' OR rejection_reason IS NOT NULL)
);

CREATE INDEX idx_budget_expenses_budget ON budget_expenses(budget_id) WHERE status = 'approved';
CREATE INDEX idx_budget_expenses_listing ON budget_expenses(department_id, created_at DESC);
";

const BUDGET_EXPENSE_BREAKDOWNS_SQL: &str = r"
CREATE TABLE budget_expense_breakdowns (
    id UUID PRIMARY KEY,
    budget_expense_id UUID NOT NULL REFERENCES budget_expenses(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    payment_method VARCHAR(100),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT chk_budget_expense_breakdown_amount CHECK (amount > 0)
);

CREATE INDEX idx_budget_expense_breakdowns_parent ON budget_expense_breakdowns(budget_expense_id);
";

const RECEIPTS_SQL: &str = r"
CREATE TABLE receipts (
    id UUID PRIMARY KEY,
    department_id UUID NOT NULL REFERENCES departments(id),
    expense_id UUID REFERENCES expenses(id),
    budget_expense_id UUID REFERENCES budget_expenses(id),
    file_name VARCHAR(255) NOT NULL,
    file_url TEXT NOT NULL,
    content_type VARCHAR(100),
    size_bytes BIGINT,
    uploaded_by UUID NOT NULL REFERENCES users(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    -- Exactly one parent
    CONSTRAINT chk_receipt_parent CHECK (num_nonnulls(expense_id, budget_expense_id) = 1),
    CONSTRAINT chk_receipt_size CHECK (size_bytes IS NULL OR size_bytes >= 0)
);

CREATE INDEX idx_receipts_expense ON receipts(expense_id);
CREATE INDEX idx_receipts_budget_expense ON receipts(budget_expense_id);
";

const AUDIT_LOGS_SQL: &str = r"
CREATE TABLE audit_logs (
    id UUID PRIMARY KEY,
    department_id UUID REFERENCES departments(id),
    actor_id UUID,
    action VARCHAR(64) NOT NULL,
    entity_type VARCHAR(64) NOT NULL,
    entity_id UUID,
    old_values JSONB,
    new_values JSONB,
    ip_address VARCHAR(64),
    user_agent TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_audit_logs_department_created ON audit_logs(department_id, created_at DESC);
CREATE INDEX idx_audit_logs_entity ON audit_logs(entity_type, entity_id);
CREATE INDEX idx_audit_logs_actor ON audit_logs(actor_id);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_audit_log_modification
-- The audit trail is append-only
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_audit_log_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'audit_logs is append-only';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_audit_logs_append_only
BEFORE UPDATE OR DELETE ON audit_logs
FOR EACH ROW
EXECUTE FUNCTION prevent_audit_log_modification();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================

DROP TRIGGER IF EXISTS trg_audit_logs_append_only ON audit_logs;
DROP FUNCTION IF EXISTS prevent_audit_log_modification();

DROP TABLE IF EXISTS audit_logs CASCADE;
DROP TABLE IF EXISTS receipts CASCADE;
DROP TABLE IF EXISTS budget_expense_breakdowns CASCADE;
DROP TABLE IF EXISTS budget_expenses CASCADE;
DROP TABLE IF EXISTS budget_breakdowns CASCADE;
DROP TABLE IF EXISTS budgets CASCADE;
DROP TABLE IF EXISTS expenses CASCADE;
DROP TABLE IF EXISTS budget_allotments CASCADE;
DROP TABLE IF EXISTS budget_plans CASCADE;
DROP TABLE IF EXISTS categories CASCADE;
DROP TABLE IF EXISTS department_fiscal_years CASCADE;
DROP TABLE IF EXISTS users CASCADE;
DROP TABLE IF EXISTS departments CASCADE;

DROP TYPE IF EXISTS plan_status;
DROP TYPE IF EXISTS expense_status;
DROP TYPE IF EXISTS user_role;
";
