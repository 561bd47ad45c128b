//! Postgres-backed store.
//!
//! One unit of work is one database transaction. Row locks (`FOR UPDATE`)
//! taken inside it are held until commit or rollback; dropping the unit of
//! work drops the transaction, which rolls back.
//!
//! ## Error mapping
//!
//! | SQLx error | Postgres code | `StoreError` |
//! |------------|---------------|--------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (other) | any | `Backend` |
//! | Decode / ColumnDecode | n/a | `Corrupt` |
//! | anything else | n/a | `Backend` |

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use storefront_auth::{AuthSession, Role, User, UserProfile, UserStatus};
use storefront_core::{CartId, Entity, Money, OrderId, ProductId, SessionId, UserId, VariantId};
use storefront_inventory::StockLevel;
use storefront_sales::{
    Cart, CartLine, CartOwner, DeliveryDetails, Order, OrderLine, OrderParts, OrderStatus,
    PriceBreakdown,
};

use super::{
    CartRepository, CatalogRepository, OrderRepository, ProductRecord, SessionRepository,
    StockRepository, Store, StoreError, UnitOfWork, UserRepository, VariantRecord,
};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::backend("migrate", e.to_string()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

#[async_trait]
impl CatalogRepository for PgUnitOfWork {
    async fn variant(&mut self, id: VariantId) -> Result<Option<VariantRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, price, stock, active
            FROM product_variants
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("variant", e))?;

        row.map(|r| variant_from_row(&r)).transpose()
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<ProductRecord>, StoreError> {
        let row = sqlx::query("SELECT id, name, images FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("product", e))?;

        row.map(|r| {
            Ok::<_, StoreError>(ProductRecord {
                id: ProductId::from_uuid(get(&r, "id")?),
                name: get(&r, "name")?,
                images: get(&r, "images")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl StockRepository for PgUnitOfWork {
    #[instrument(skip(self, ids), fields(variant_count = ids.len()), err)]
    async fn lock_stock(&mut self, ids: &[VariantId]) -> Result<Vec<StockLevel>, StoreError> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, stock, active
            FROM product_variants
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&uuids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_stock", e))?;

        rows.iter()
            .map(|r| {
                Ok::<_, StoreError>(StockLevel {
                    variant_id: VariantId::from_uuid(get(r, "id")?),
                    available: to_u32(get::<i32>(r, "stock")?, "stock")?,
                    active: get(r, "active")?,
                })
            })
            .collect()
    }

    async fn set_stock(&mut self, id: VariantId, available: u32) -> Result<(), StoreError> {
        let stock = i32::try_from(available)
            .map_err(|_| StoreError::backend("set_stock", format!("stock {available} out of range")))?;
        sqlx::query("UPDATE product_variants SET stock = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(stock)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_stock", e))?;
        Ok(())
    }
}

#[async_trait]
impl CartRepository for PgUnitOfWork {
    async fn load_cart(&mut self, owner: &CartOwner) -> Result<Option<Cart>, StoreError> {
        let query = match owner {
            CartOwner::User(user_id) => sqlx::query(
                "SELECT id, user_id, session_id, created_at, updated_at FROM carts WHERE user_id = $1 FOR UPDATE",
            )
            .bind(*user_id.as_uuid()),
            CartOwner::Session(session_id) => sqlx::query(
                "SELECT id, user_id, session_id, created_at, updated_at FROM carts WHERE session_id = $1 FOR UPDATE",
            )
            .bind(session_id.clone()),
        };

        let Some(row) = query
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_cart", e))?
        else {
            return Ok(None);
        };

        let cart_id = CartId::from_uuid(get(&row, "id")?);
        let line_rows = sqlx::query(
            r#"
            SELECT variant_id, quantity, unit_price
            FROM cart_lines
            WHERE cart_id = $1
            ORDER BY position
            "#,
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_cart_lines", e))?;

        let lines = line_rows
            .iter()
            .map(|r| {
                Ok::<_, StoreError>(CartLine {
                    variant_id: VariantId::from_uuid(get(r, "variant_id")?),
                    quantity: to_u32(get::<i64>(r, "quantity")?, "quantity")?,
                    unit_price: Money::new(get::<Decimal>(r, "unit_price")?),
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Cart::from_parts(
            cart_id,
            owner.clone(),
            lines,
            get(&row, "created_at")?,
            get(&row, "updated_at")?,
        )
        .map(Some)
        .map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    #[instrument(skip(self, cart), fields(cart_id = %cart.id(), line_count = cart.lines().len()), err)]
    async fn save_cart(&mut self, cart: &Cart) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, session_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(cart.id().as_uuid())
        .bind(cart.owner().user_id().map(Uuid::from))
        .bind(cart.owner().session_id())
        .bind(cart.created_at())
        .bind(cart.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_cart", e))?;

        sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
            .bind(cart.id().as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("clear_cart_lines", e))?;

        for (position, line) in cart.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_lines (cart_id, variant_id, quantity, unit_price, position)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(cart.id().as_uuid())
            .bind(line.variant_id.as_uuid())
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.amount())
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_cart_line", e))?;
        }

        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgUnitOfWork {
    #[instrument(skip(self, order), fields(order_id = %order.id(), order_number = %order.order_number()), err)]
    async fn insert_order(&mut self, order: &Order) -> Result<bool, StoreError> {
        let price = order.price();
        let delivery = order.delivery();
        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, order_number, status, payment_method, phone, shipping_address,
                subtotal, shipping, tax, total, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (order_number) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.user_id().as_uuid())
        .bind(order.order_number().as_str())
        .bind(order.status().as_str())
        .bind(delivery.payment_method.as_str())
        .bind(&delivery.phone)
        .bind(&delivery.shipping_address)
        .bind(price.subtotal.amount())
        .bind(price.shipping.amount())
        .bind(price.tax.amount())
        .bind(price.total.amount())
        .bind(order.created_at())
        .bind(order.updated_at())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        if inserted.is_none() {
            return Ok(false);
        }

        for (idx, line) in order.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (
                    order_id, line_no, variant_id, product_name, image_url,
                    quantity, unit_price, line_total
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(idx as i32 + 1)
            .bind(line.variant_id.as_uuid())
            .bind(&line.product_name)
            .bind(line.image_url.as_deref())
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.amount())
            .bind(line.line_total.amount())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_line", e))?;
        }

        Ok(true)
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!("{ORDER_COLUMNS} WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("order", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut lines = self.order_lines(&[*id.as_uuid()]).await?;
        order_from_row(&row, lines.remove(id.as_uuid()).unwrap_or_default()).map(Some)
    }

    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "{ORDER_COLUMNS} WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("orders_for_user", e))?;

        let ids = rows
            .iter()
            .map(|r| get::<Uuid>(r, "id"))
            .collect::<Result<Vec<_>, _>>()?;
        let mut lines = self.order_lines(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| order_from_row(row, lines.remove(&id).unwrap_or_default()))
            .collect()
    }

    #[instrument(skip(self, order), fields(order_id = %order.id(), status = %order.status()), err)]
    async fn update_order_status(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order.id().as_uuid())
            .bind(order.status().as_str())
            .bind(order.updated_at())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_order_status", e))?;
        Ok(())
    }
}

const ORDER_COLUMNS: &str = r#"
    SELECT id, user_id, order_number, status, payment_method, phone, shipping_address,
           subtotal, shipping, tax, total, created_at, updated_at
    FROM orders"#;

impl PgUnitOfWork {
    async fn order_lines(&mut self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderLine>>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, variant_id, product_name, image_url, quantity, unit_price, line_total
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no
            "#,
        )
        .bind(order_ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("order_lines", e))?;

        let mut by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for r in &rows {
            let line = OrderLine {
                variant_id: VariantId::from_uuid(get(r, "variant_id")?),
                product_name: get(r, "product_name")?,
                image_url: get(r, "image_url")?,
                quantity: to_u32(get::<i64>(r, "quantity")?, "quantity")?,
                unit_price: Money::new(get(r, "unit_price")?),
                line_total: Money::new(get(r, "line_total")?),
            };
            by_order.entry(get(r, "order_id")?).or_default().push(line);
        }
        Ok(by_order)
    }
}

#[async_trait]
impl UserRepository for PgUnitOfWork {
    async fn find_user_by_login(&mut self, login: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "{USER_COLUMNS} WHERE lower(username) = lower($1) OR email = lower($1) \
             ORDER BY (lower(username) = lower($1)) DESC LIMIT 1"
        ))
        .bind(login.trim())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_login", e))?;

        row.map(|r| user_from_row(&r)).transpose()
    }

    async fn user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("{USER_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("user", e))?;

        row.map(|r| user_from_row(&r)).transpose()
    }

    async fn identity_taken(&mut self, username: &str, email: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM users WHERE lower(username) = lower($1) OR email = lower($2)) AS taken",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("identity_taken", e))?;

        get(&row, "taken")
    }

    async fn role_exists(&mut self, role: &Role) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM roles WHERE name = $1) AS present")
            .bind(role.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("role_exists", e))?;

        get(&row, "present")
    }

    #[instrument(skip(self, user, profile), fields(user_id = %user.id), err)]
    async fn insert_user(&mut self, user: &User, profile: &UserProfile) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, password_hash, role, status,
                first_name, last_name, last_login_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.first_name.as_deref())
        .bind(user.last_name.as_deref())
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;

        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, first_name, last_name, phone, avatar_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(profile.user_id.as_uuid())
        .bind(profile.first_name.as_deref())
        .bind(profile.last_name.as_deref())
        .bind(profile.phone.as_deref())
        .bind(profile.avatar_url.as_deref())
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user_profile", e))?;

        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET role = $2, status = $3, first_name = $4, last_name = $5,
                last_login_at = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.first_name.as_deref())
        .bind(user.last_name.as_deref())
        .bind(user.last_login_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;
        Ok(())
    }
}

const USER_COLUMNS: &str = r#"
    SELECT id, username, email, password_hash, role, status,
           first_name, last_name, last_login_at, created_at, updated_at
    FROM users"#;

const SESSION_COLUMNS: &str = r#"
    SELECT id, token_digest, user_id, expires_at, revoked, revoked_at, replaced_by, created_at
    FROM auth_sessions"#;

#[async_trait]
impl SessionRepository for PgUnitOfWork {
    #[instrument(skip(self, session), fields(session_id = %session.id, user_id = %session.user_id), err)]
    async fn insert_session(&mut self, session: &AuthSession) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO auth_sessions (
                id, token_digest, user_id, expires_at, revoked, revoked_at, replaced_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session.id.as_uuid())
        .bind(&session.token_digest)
        .bind(session.user_id.as_uuid())
        .bind(session.expires_at)
        .bind(session.revoked)
        .bind(session.revoked_at)
        .bind(session.replaced_by.map(Uuid::from))
        .bind(session.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_session", e))?;
        Ok(())
    }

    async fn lock_session_by_digest(&mut self, digest: &str) -> Result<Option<AuthSession>, StoreError> {
        let row = sqlx::query(&format!("{SESSION_COLUMNS} WHERE token_digest = $1 FOR UPDATE"))
            .bind(digest)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_session_by_digest", e))?;

        row.map(|r| session_from_row(&r)).transpose()
    }

    async fn lock_session(&mut self, id: SessionId) -> Result<Option<AuthSession>, StoreError> {
        let row = sqlx::query(&format!("{SESSION_COLUMNS} WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_session", e))?;

        row.map(|r| session_from_row(&r)).transpose()
    }

    async fn update_session(&mut self, session: &AuthSession) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE auth_sessions SET revoked = $2, revoked_at = $3, replaced_by = $4 WHERE id = $1",
        )
        .bind(session.id.as_uuid())
        .bind(session.revoked)
        .bind(session.revoked_at)
        .bind(session.replaced_by.map(Uuid::from))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_session", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn revoke_user_sessions(&mut self, user_id: UserId, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE, revoked_at = $2
            WHERE user_id = $1 AND NOT revoked AND expires_at > $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("revoke_user_sessions", e))?;
        Ok(result.rows_affected())
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("column {column}: {e}")))
}

fn to_u32<N>(value: N, column: &str) -> Result<u32, StoreError>
where
    N: TryInto<u32> + Copy + core::fmt::Display,
{
    value
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("column {column}: {value} out of range")))
}

fn variant_from_row(row: &PgRow) -> Result<VariantRecord, StoreError> {
    Ok(VariantRecord {
        id: VariantId::from_uuid(get(row, "id")?),
        product_id: ProductId::from_uuid(get(row, "product_id")?),
        price: Money::new(get(row, "price")?),
        stock: to_u32(get::<i32>(row, "stock")?, "stock")?,
        active: get(row, "active")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let status: String = get(row, "status")?;
    Ok(User {
        id: UserId::from_uuid(get(row, "id")?),
        username: get(row, "username")?,
        email: get(row, "email")?,
        password_hash: get(row, "password_hash")?,
        role: Role::new(get::<String>(row, "role")?),
        status: UserStatus::parse(&status).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        first_name: get(row, "first_name")?,
        last_name: get(row, "last_name")?,
        last_login_at: get(row, "last_login_at")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn session_from_row(row: &PgRow) -> Result<AuthSession, StoreError> {
    Ok(AuthSession {
        id: SessionId::from_uuid(get(row, "id")?),
        token_digest: get(row, "token_digest")?,
        user_id: UserId::from_uuid(get(row, "user_id")?),
        expires_at: get(row, "expires_at")?,
        revoked: get(row, "revoked")?,
        revoked_at: get(row, "revoked_at")?,
        replaced_by: get::<Option<Uuid>>(row, "replaced_by")?.map(SessionId::from_uuid),
        created_at: get(row, "created_at")?,
    })
}

fn order_from_row(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order, StoreError> {
    let corrupt = |e: storefront_core::DomainError| StoreError::Corrupt(e.to_string());

    let order_number: String = get(row, "order_number")?;
    let status: String = get(row, "status")?;
    let payment_method: String = get(row, "payment_method")?;

    Order::from_parts(OrderParts {
        id: OrderId::from_uuid(get(row, "id")?),
        user_id: UserId::from_uuid(get(row, "user_id")?),
        order_number: order_number.parse().map_err(corrupt)?,
        status: status.parse::<OrderStatus>().map_err(corrupt)?,
        delivery: DeliveryDetails {
            payment_method: payment_method.parse().map_err(corrupt)?,
            phone: get(row, "phone")?,
            shipping_address: get(row, "shipping_address")?,
        },
        price: PriceBreakdown {
            subtotal: Money::new(get(row, "subtotal")?),
            shipping: Money::new(get(row, "shipping")?),
            tax: Money::new(get(row, "tax")?),
            total: Money::new(get(row, "total")?),
        },
        lines,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
    .map_err(corrupt)
}

/// Map SQLx errors to store errors (see module docs).
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                let what = db_err.constraint().unwrap_or("row").to_string();
                StoreError::Duplicate(what)
            } else {
                StoreError::backend(operation, db_err.message().to_string())
            }
        }
        sqlx::Error::Decode(e) => StoreError::Corrupt(format!("{operation}: {e}")),
        sqlx::Error::ColumnDecode { index, source } => {
            StoreError::Corrupt(format!("{operation}: column {index}: {source}"))
        }
        sqlx::Error::PoolClosed => StoreError::backend(operation, "connection pool closed"),
        other => StoreError::backend(operation, other.to_string()),
    }
}
