use chrono::{Local, Utc};
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::db::models::{
    BuyReceipt, NewStock, Stock, StockAccount, StockTransaction, StockTransactionUpdate,
    StockUpdate, TransactionStock, TransactionStockUpdate, BUY_TRANSACTION,
};
use crate::db::operations::{find_user_by_uid, non_empty, DbOperations};
use crate::error::{AppError, DatabaseError};
use crate::Result;

/// Balance every new stock game account starts with.
pub const STARTING_BALANCE: i64 = 100_000;

const STOCK_COLUMNS: &str = "id, symbol, company, quantity, price";
const ACCOUNT_COLUMNS: &str = "id, user_uid, balance, account_date";
const TRANSACTION_COLUMNS: &str = "id, stock_user_id, transaction_type, quantity, transaction_date";
const DETAIL_COLUMNS: &str = "stock_user_id, transaction_id, stock_id, quantity, price_per_stock, transaction_amount, transaction_time";

impl DbOperations {
    // Stock catalog

    pub async fn create_stock(&self, stock: &NewStock) -> Result<Stock> {
        let stock = sqlx::query_as::<_, Stock>(&format!(
            "INSERT INTO stocks (symbol, company, quantity, price) VALUES (?, ?, ?, ?) RETURNING {STOCK_COLUMNS}"
        ))
        .bind(&stock.symbol)
        .bind(&stock.company)
        .bind(stock.quantity)
        .bind(stock.price)
        .fetch_one(self.pool())
        .await?;

        info!("Listed stock {} at {}", stock.symbol, stock.price);
        Ok(stock)
    }

    pub async fn get_stock(&self, id: i64) -> Result<Option<Stock>> {
        let stock = sqlx::query_as::<_, Stock>(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(stock)
    }

    pub async fn get_stock_by_symbol(&self, symbol: &str) -> Result<Option<Stock>> {
        let mut conn = self.pool().acquire().await?;
        find_stock_by_symbol(&mut conn, symbol).await
    }

    pub async fn list_stocks(&self) -> Result<Vec<Stock>> {
        let stocks = sqlx::query_as::<_, Stock>(&format!(
            "SELECT {STOCK_COLUMNS} FROM stocks ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(stocks)
    }

    /// Symbol and company change only when non-empty, quantity only when
    /// positive.
    pub async fn update_stock(&self, id: i64, update: &StockUpdate) -> Result<Stock> {
        let mut stock = self
            .get_stock(id)
            .await?
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))?;

        if let Some(symbol) = non_empty(&update.symbol) {
            stock.symbol = symbol.to_string();
        }
        if let Some(company) = non_empty(&update.company) {
            stock.company = company.to_string();
        }
        if let Some(quantity) = update.quantity.filter(|q| *q > 0) {
            stock.quantity = quantity;
        }

        let stock = sqlx::query_as::<_, Stock>(&format!(
            "UPDATE stocks SET symbol = ?, company = ?, quantity = ? WHERE id = ? RETURNING {STOCK_COLUMNS}"
        ))
        .bind(&stock.symbol)
        .bind(&stock.company)
        .bind(stock.quantity)
        .bind(stock.id)
        .fetch_one(self.pool())
        .await?;

        Ok(stock)
    }

    pub async fn get_price(&self, symbol: &str) -> Result<i64> {
        Ok(self.require_stock(symbol).await?.price)
    }

    pub async fn get_stock_id(&self, symbol: &str) -> Result<i64> {
        Ok(self.require_stock(symbol).await?.id)
    }

    async fn require_stock(&self, symbol: &str) -> Result<Stock> {
        self.get_stock_by_symbol(symbol)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("stock '{}'", symbol)))
    }

    // Accounts

    /// Open a stock game account for the user with `uid`. An existing
    /// account is returned unchanged.
    pub async fn add_stock_user(&self, uid: &str) -> Result<StockAccount> {
        let mut transaction = self.begin_transaction().await?;

        let user = find_user_by_uid(&mut transaction, uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{}'", uid)))?;

        if let Some(account) = find_account(&mut transaction, &user.uid).await? {
            info!("Stock account for user {} already exists", uid);
            transaction.rollback().await?;
            return Ok(account);
        }

        let account = sqlx::query_as::<_, StockAccount>(&format!(
            "INSERT INTO stock_users (user_uid, balance, account_date) VALUES (?, ?, ?) RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(&user.uid)
        .bind(STARTING_BALANCE)
        .bind(Local::now().date_naive())
        .fetch_one(&mut *transaction)
        .await?;

        transaction.commit().await?;
        info!("Opened stock account {} for user {}", account.id, uid);
        Ok(account)
    }

    pub async fn get_stock_account(&self, uid: &str) -> Result<Option<StockAccount>> {
        let mut conn = self.pool().acquire().await?;
        find_account(&mut conn, uid).await
    }

    pub async fn get_balance(&self, uid: &str) -> Result<i64> {
        Ok(self.require_account(uid).await?.balance)
    }

    pub async fn get_stock_user_id(&self, uid: &str) -> Result<i64> {
        Ok(self.require_account(uid).await?.id)
    }

    async fn require_account(&self, uid: &str) -> Result<StockAccount> {
        self.get_stock_account(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("stock account for user '{}'", uid)))
    }

    /// Balance changes only when positive.
    pub async fn update_stock_account(&self, id: i64, balance: Option<i64>) -> Result<StockAccount> {
        let account = match balance.filter(|b| *b > 0) {
            Some(balance) => sqlx::query_as::<_, StockAccount>(&format!(
                "UPDATE stock_users SET balance = ? WHERE id = ? RETURNING {ACCOUNT_COLUMNS}"
            ))
            .bind(balance)
            .bind(id)
            .fetch_optional(self.pool())
            .await?,
            None => sqlx::query_as::<_, StockAccount>(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM stock_users WHERE id = ?"
            ))
            .bind(id)
            .fetch_optional(self.pool())
            .await?,
        };

        account.ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }

    // Transactions

    pub async fn create_transaction(
        &self,
        stock_user_id: i64,
        transaction_type: &str,
        quantity: i64,
    ) -> Result<StockTransaction> {
        let mut conn = self.pool().acquire().await?;
        insert_transaction(&mut conn, stock_user_id, transaction_type, quantity).await
    }

    pub async fn get_transaction(&self, id: i64) -> Result<Option<StockTransaction>> {
        let transaction = sqlx::query_as::<_, StockTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(transaction)
    }

    pub async fn list_transactions(&self, stock_user_id: i64) -> Result<Vec<StockTransaction>> {
        let transactions = sqlx::query_as::<_, StockTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions WHERE stock_user_id = ? ORDER BY id"
        ))
        .bind(stock_user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(transactions)
    }

    pub async fn update_transaction(
        &self,
        id: i64,
        update: &StockTransactionUpdate,
    ) -> Result<StockTransaction> {
        let mut transaction = self
            .get_transaction(id)
            .await?
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))?;

        if let Some(stock_user_id) = update.stock_user_id {
            transaction.stock_user_id = stock_user_id;
        }
        if let Some(transaction_type) = non_empty(&update.transaction_type) {
            transaction.transaction_type = transaction_type.to_string();
        }
        if let Some(quantity) = update.quantity {
            transaction.quantity = quantity;
        }

        let transaction = sqlx::query_as::<_, StockTransaction>(&format!(
            "UPDATE stock_transactions SET stock_user_id = ?, transaction_type = ?, quantity = ? WHERE id = ? RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(transaction.stock_user_id)
        .bind(&transaction.transaction_type)
        .bind(transaction.quantity)
        .bind(transaction.id)
        .fetch_one(self.pool())
        .await?;

        Ok(transaction)
    }

    /// Record a buy of `quantity` shares for `uid`, returning the new
    /// transaction id.
    pub async fn log_buy(&self, uid: &str, quantity: i64) -> Result<i64> {
        let account = self.get_stock_account(uid).await?.ok_or_else(|| {
            AppError::ValidationError("account has not been autocreated for stock game".into())
        })?;

        let transaction = self
            .create_transaction(account.id, BUY_TRANSACTION, quantity)
            .await?;
        Ok(transaction.id)
    }

    // Transaction ↔ stock join rows

    pub async fn create_transaction_stock(
        &self,
        detail: &TransactionStock,
    ) -> Result<TransactionStock> {
        let detail = sqlx::query_as::<_, TransactionStock>(&format!(
            r#"
            INSERT INTO transaction_stocks
                (stock_user_id, transaction_id, stock_id, quantity, price_per_stock, transaction_amount, transaction_time)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {DETAIL_COLUMNS}
            "#
        ))
        .bind(detail.stock_user_id)
        .bind(detail.transaction_id)
        .bind(detail.stock_id)
        .bind(detail.quantity)
        .bind(detail.price_per_stock)
        .bind(detail.transaction_amount)
        .bind(detail.transaction_time)
        .fetch_one(self.pool())
        .await?;

        Ok(detail)
    }

    pub async fn get_transaction_stock(&self, transaction_id: i64) -> Result<Option<TransactionStock>> {
        let mut conn = self.pool().acquire().await?;
        find_detail(&mut conn, transaction_id).await
    }

    pub async fn update_transaction_stock(
        &self,
        transaction_id: i64,
        update: &TransactionStockUpdate,
    ) -> Result<TransactionStock> {
        let mut detail = self
            .get_transaction_stock(transaction_id)
            .await?
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))?;

        if let Some(quantity) = update.quantity {
            detail.quantity = quantity;
        }
        if let Some(price_per_stock) = update.price_per_stock {
            detail.price_per_stock = price_per_stock;
        }
        if let Some(transaction_amount) = update.transaction_amount {
            detail.transaction_amount = transaction_amount;
        }

        let detail = sqlx::query_as::<_, TransactionStock>(&format!(
            r#"
            UPDATE transaction_stocks
            SET quantity = ?, price_per_stock = ?, transaction_amount = ?
            WHERE stock_user_id = ? AND transaction_id = ? AND stock_id = ?
            RETURNING {DETAIL_COLUMNS}
            "#
        ))
        .bind(detail.quantity)
        .bind(detail.price_per_stock)
        .bind(detail.transaction_amount)
        .bind(detail.stock_user_id)
        .bind(detail.transaction_id)
        .bind(detail.stock_id)
        .fetch_one(self.pool())
        .await?;

        Ok(detail)
    }

    /// Attach the stock side of a buy to `transaction_id`. Returns `None`
    /// when the transaction does not exist or already has its detail row.
    pub async fn log_buy_detail(
        &self,
        transaction_id: i64,
        uid: &str,
        symbol: &str,
        quantity: i64,
        value: i64,
    ) -> Result<Option<TransactionStock>> {
        let Some(transaction) = self.get_transaction(transaction_id).await? else {
            warn!("Transaction {} does not exist", transaction_id);
            return Ok(None);
        };

        if self.get_transaction_stock(transaction.id).await?.is_some() {
            info!("Transaction {} already has its stock recorded", transaction_id);
            return Ok(None);
        }

        let stock = self.require_stock(symbol).await?;
        let detail = TransactionStock {
            stock_user_id: self.get_stock_user_id(uid).await?,
            transaction_id: transaction.id,
            stock_id: stock.id,
            quantity,
            price_per_stock: stock.price as f64,
            transaction_amount: value,
            transaction_time: Utc::now().naive_utc(),
        };

        self.create_transaction_stock(&detail).await.map(Some)
    }

    /// Buy `quantity` shares of `symbol` for `uid` in a single database
    /// transaction: debit the account, take the shares off the catalog and
    /// record the transaction with its stock detail.
    pub async fn buy_stock(&self, uid: &str, symbol: &str, quantity: i64) -> Result<BuyReceipt> {
        if quantity <= 0 {
            return Err(AppError::ValidationError("quantity must be positive".into()));
        }

        let mut transaction = self.begin_transaction().await?;

        let account = find_account(&mut transaction, uid).await?.ok_or_else(|| {
            AppError::ValidationError("account has not been autocreated for stock game".into())
        })?;
        let stock = find_stock_by_symbol(&mut transaction, symbol)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("stock '{}'", symbol)))?;

        if stock.quantity < quantity {
            return Err(AppError::ValidationError(format!(
                "only {} shares of {} available",
                stock.quantity, stock.symbol
            )));
        }
        let value = stock
            .price
            .checked_mul(quantity)
            .ok_or_else(|| AppError::ValidationError("order value too large".into()))?;
        if account.balance < value {
            return Err(AppError::ValidationError(format!(
                "insufficient balance: {} needed, {} available",
                value, account.balance
            )));
        }

        let logged =
            insert_transaction(&mut transaction, account.id, BUY_TRANSACTION, quantity).await?;

        sqlx::query(
            r#"
            INSERT INTO transaction_stocks
                (stock_user_id, transaction_id, stock_id, quantity, price_per_stock, transaction_amount, transaction_time)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id)
        .bind(logged.id)
        .bind(stock.id)
        .bind(quantity)
        .bind(stock.price as f64)
        .bind(value)
        .bind(Utc::now().naive_utc())
        .execute(&mut *transaction)
        .await?;

        let balance: (i64,) = sqlx::query_as(
            "UPDATE stock_users SET balance = balance - ? WHERE id = ? RETURNING balance",
        )
        .bind(value)
        .bind(account.id)
        .fetch_one(&mut *transaction)
        .await?;

        sqlx::query("UPDATE stocks SET quantity = quantity - ? WHERE id = ?")
            .bind(quantity)
            .bind(stock.id)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;
        info!("User {} bought {} x {} for {}", uid, quantity, stock.symbol, value);

        Ok(BuyReceipt {
            transaction_id: logged.id,
            symbol: stock.symbol,
            quantity,
            price_per_stock: stock.price as f64,
            transaction_amount: value,
            balance: balance.0,
        })
    }
}

async fn find_stock_by_symbol(conn: &mut SqliteConnection, symbol: &str) -> Result<Option<Stock>> {
    let stock = sqlx::query_as::<_, Stock>(&format!(
        "SELECT {STOCK_COLUMNS} FROM stocks WHERE symbol = ? ORDER BY id LIMIT 1"
    ))
    .bind(symbol)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(stock)
}

async fn find_account(conn: &mut SqliteConnection, uid: &str) -> Result<Option<StockAccount>> {
    let account = sqlx::query_as::<_, StockAccount>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM stock_users WHERE user_uid = ?"
    ))
    .bind(uid)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(account)
}

async fn find_detail(
    conn: &mut SqliteConnection,
    transaction_id: i64,
) -> Result<Option<TransactionStock>> {
    let detail = sqlx::query_as::<_, TransactionStock>(&format!(
        "SELECT {DETAIL_COLUMNS} FROM transaction_stocks WHERE transaction_id = ?"
    ))
    .bind(transaction_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(detail)
}

async fn insert_transaction(
    conn: &mut SqliteConnection,
    stock_user_id: i64,
    transaction_type: &str,
    quantity: i64,
) -> Result<StockTransaction> {
    let transaction = sqlx::query_as::<_, StockTransaction>(&format!(
        "INSERT INTO stock_transactions (stock_user_id, transaction_type, quantity, transaction_date) VALUES (?, ?, ?, ?) RETURNING {TRANSACTION_COLUMNS}"
    ))
    .bind(stock_user_id)
    .bind(transaction_type)
    .bind(quantity)
    .bind(Local::now().date_naive())
    .fetch_one(&mut *conn)
    .await?;

    Ok(transaction)
}
