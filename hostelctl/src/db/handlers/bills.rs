//! Database repository for bills and their line items.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::bills::{
        BillCreateDBRequest, BillDBResponse, BillItem, BillRow, BillStatus, BillUpdateDBRequest, derive_totals, format_bill_number,
    },
};
use crate::types::{BillId, MemberId, abbrev_uuid};
use sqlx::{Connection, FromRow, PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

const SELECT_BILLS: &str = r#"
    SELECT b.id, b.member_id, m.full_name AS member_name, b.bill_number, b.bill_month, b.total_amount,
           b.paid_amount, b.due_amount, b.status, b.generated_by, b.remarks, b.created_at, b.updated_at
    FROM bills b
    JOIN members m ON m.id = b.member_id
"#;

/// Filter for listing bills
#[derive(Debug, Clone, Default)]
pub struct BillFilter {
    pub member_id: Option<MemberId>,
    pub bill_month: Option<String>,
    pub status: Option<BillStatus>,
}

#[derive(Debug, FromRow)]
struct BillLine {
    bill_id: BillId,
    #[sqlx(flatten)]
    item: BillItem,
}

pub struct Bills<'c> {
    db: &'c mut PgConnection,
}

async fn replace_items(db: &mut PgConnection, bill_id: BillId, items: &[BillItem]) -> Result<()> {
    sqlx::query("DELETE FROM bill_items WHERE bill_id = $1")
        .bind(bill_id)
        .execute(&mut *db)
        .await?;

    for (position, item) in items.iter().enumerate() {
        sqlx::query("INSERT INTO bill_items (bill_id, position, title, amount) VALUES ($1, $2, $3, $4)")
            .bind(bill_id)
            .bind(position as i32)
            .bind(&item.title)
            .bind(item.amount)
            .execute(&mut *db)
            .await?;
    }
    Ok(())
}

impl<'c> Bills<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    async fn with_items(&mut self, rows: Vec<BillRow>) -> Result<Vec<BillDBResponse>> {
        let ids: Vec<BillId> = rows.iter().map(|r| r.id).collect();
        let lines = sqlx::query_as::<_, BillLine>(
            "SELECT bill_id, title, amount FROM bill_items WHERE bill_id = ANY($1) ORDER BY bill_id, position",
        )
        .bind(&ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut by_bill: HashMap<BillId, Vec<BillItem>> = HashMap::new();
        for line in lines {
            by_bill.entry(line.bill_id).or_default().push(line.item);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = by_bill.remove(&row.id).unwrap_or_default();
                BillDBResponse::from((row, items))
            })
            .collect())
    }

    #[instrument(skip(self), fields(bill_id = %abbrev_uuid(&id)), err)]
    pub async fn lock(&mut self, id: BillId) -> Result<Option<BillDBResponse>> {
        let row = sqlx::query_as::<_, BillRow>(&format!("{SELECT_BILLS} WHERE b.id = $1 FOR UPDATE OF b"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match row {
            Some(row) => Ok(self.with_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Bills<'c> {
    type CreateRequest = BillCreateDBRequest;
    type UpdateRequest = BillUpdateDBRequest;
    type Response = BillDBResponse;
    type Id = BillId;
    type Filter = BillFilter;

    /// Numbers come from `bill_number_seq`, so concurrent creates never collide.
    #[instrument(skip(self, request), fields(member_id = %abbrev_uuid(&request.member_id), month = %request.bill_month), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id: BillId;
        {
            let mut tx = self.db.begin().await?;

            let sequence: i64 = sqlx::query_scalar("SELECT nextval('bill_number_seq')")
                .fetch_one(&mut *tx)
                .await?;
            let totals = derive_totals(&request.items, rust_decimal::Decimal::ZERO);

            id = sqlx::query_scalar(
                r#"
                INSERT INTO bills (member_id, bill_number, bill_month, total_amount, due_amount, status, generated_by, remarks)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
                "#,
            )
            .bind(request.member_id)
            .bind(format_bill_number(sequence))
            .bind(&request.bill_month)
            .bind(totals.total)
            .bind(totals.due)
            .bind(totals.status)
            .bind(request.generated_by)
            .bind(&request.remarks)
            .fetch_one(&mut *tx)
            .await?;

            replace_items(&mut tx, id, &request.items).await?;
            tx.commit().await?;
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(bill_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let row = sqlx::query_as::<_, BillRow>(&format!("{SELECT_BILLS} WHERE b.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match row {
            Some(row) => Ok(self.with_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, BillRow>(&format!("{SELECT_BILLS} WHERE b.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(self.with_items(rows).await?.into_iter().map(|b| (b.id, b)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(SELECT_BILLS);
        query.push(" WHERE TRUE");
        if let Some(member_id) = filter.member_id {
            query.push(" AND b.member_id = ").push_bind(member_id);
        }
        if let Some(month) = &filter.bill_month {
            query.push(" AND b.bill_month = ").push_bind(month.clone());
        }
        if let Some(status) = filter.status {
            query.push(" AND b.status = ").push_bind(status);
        }
        query.push(" ORDER BY b.created_at DESC");

        let rows = query.build_query_as::<BillRow>().fetch_all(&mut *self.db).await?;
        self.with_items(rows).await
    }

    /// Hard delete; items go with the bill
    #[instrument(skip(self), fields(bill_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bills WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Apply new items, remarks or paid amount and re-derive total, due and status.
    #[instrument(skip(self, request), fields(bill_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        {
            let mut tx = self.db.begin().await?;

            let current = Bills::new(&mut tx).lock(id).await?.ok_or(DbError::NotFound)?;
            let items = request.items.as_ref().unwrap_or(&current.items);
            let paid = request.paid_amount.unwrap_or(current.paid_amount);
            let totals = derive_totals(items, paid);

            sqlx::query(
                r#"
                UPDATE bills SET
                    remarks = COALESCE($2, remarks),
                    paid_amount = $3,
                    total_amount = $4,
                    due_amount = $5,
                    status = $6,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&request.remarks)
            .bind(paid)
            .bind(totals.total)
            .bind(totals.due)
            .bind(totals.status)
            .execute(&mut *tx)
            .await?;

            if let Some(items) = &request.items {
                replace_items(&mut tx, id, items).await?;
            }
            tx.commit().await?;
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}
