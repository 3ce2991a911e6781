//! Database repository for food orders and their snapshot lines.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::food_orders::{
        FoodOrderCreateDBRequest, FoodOrderDBResponse, FoodOrderLine, FoodOrderRow, FoodOrderUpdateDBRequest, order_total,
    },
};
use crate::types::{BillId, FoodOrderId, Lifecycle, MemberId, abbrev_uuid};
use chrono::NaiveDate;
use sqlx::{Connection, FromRow, PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

const SELECT_ORDERS: &str = r#"
    SELECT o.id, o.member_id, m.full_name AS member_name, o.ordered_by, o.order_date, o.total_amount,
           o.is_billed, o.bill_id, o.remarks, o.lifecycle, o.created_at, o.updated_at
    FROM food_orders o
    JOIN members m ON m.id = o.member_id
"#;

/// Filter for listing orders
#[derive(Debug, Clone, Default)]
pub struct FoodOrderFilter {
    pub order_date: Option<NaiveDate>,
    pub is_billed: Option<bool>,
    pub member_id: Option<MemberId>,
    pub lifecycle: Option<Lifecycle>,
}

#[derive(Debug, FromRow)]
struct OrderLine {
    order_id: FoodOrderId,
    #[sqlx(flatten)]
    line: FoodOrderLine,
}

pub struct FoodOrders<'c> {
    db: &'c mut PgConnection,
}

async fn insert_lines(db: &mut PgConnection, order_id: FoodOrderId, lines: &[FoodOrderLine]) -> Result<()> {
    for (position, line) in lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO food_order_items (order_id, position, food_item_id, name, category, price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order_id)
        .bind(position as i32)
        .bind(line.food_item_id)
        .bind(&line.name)
        .bind(line.category)
        .bind(line.price)
        .bind(line.quantity)
        .execute(&mut *db)
        .await?;
    }
    Ok(())
}

impl<'c> FoodOrders<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    async fn with_lines(&mut self, rows: Vec<FoodOrderRow>) -> Result<Vec<FoodOrderDBResponse>> {
        let ids: Vec<FoodOrderId> = rows.iter().map(|r| r.id).collect();
        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT order_id, food_item_id, name, category, price, quantity
            FROM food_order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut by_order: HashMap<FoodOrderId, Vec<FoodOrderLine>> = HashMap::new();
        for row in lines {
            by_order.entry(row.order_id).or_default().push(row.line);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let lines = by_order.remove(&row.id).unwrap_or_default();
                FoodOrderDBResponse::from((row, lines))
            })
            .collect())
    }

    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id)), err)]
    pub async fn lock(&mut self, id: FoodOrderId) -> Result<Option<FoodOrderDBResponse>> {
        let row = sqlx::query_as::<_, FoodOrderRow>(&format!("{SELECT_ORDERS} WHERE o.id = $1 FOR UPDATE OF o"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match row {
            Some(row) => Ok(self.with_lines(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Active orders of a member that no bill has consumed yet, locked for billing.
    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&member_id)), err)]
    pub async fn lock_unbilled_for_member(&mut self, member_id: MemberId) -> Result<Vec<FoodOrderDBResponse>> {
        let rows = sqlx::query_as::<_, FoodOrderRow>(&format!(
            "{SELECT_ORDERS} WHERE o.member_id = $1 AND NOT o.is_billed AND o.lifecycle = 'ACTIVE' \
             ORDER BY o.order_date, o.created_at FOR UPDATE OF o"
        ))
        .bind(member_id)
        .fetch_all(&mut *self.db)
        .await?;

        self.with_lines(rows).await
    }

    /// Flag orders as billed, optionally recording which bill consumed them.
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn mark_billed(&mut self, ids: &[FoodOrderId], bill_id: Option<BillId>) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE food_orders SET is_billed = TRUE, bill_id = COALESCE($2, bill_id), updated_at = NOW() WHERE id = ANY($1)",
        )
        .bind(ids)
        .bind(bill_id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Return every order consumed by a bill to the unbilled pool.
    #[instrument(skip(self), fields(bill_id = %abbrev_uuid(&bill_id)), err)]
    pub async fn release_for_bill(&mut self, bill_id: BillId) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE food_orders SET is_billed = FALSE, bill_id = NULL, updated_at = NOW() WHERE bill_id = $1",
        )
        .bind(bill_id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for FoodOrders<'c> {
    type CreateRequest = FoodOrderCreateDBRequest;
    type UpdateRequest = FoodOrderUpdateDBRequest;
    type Response = FoodOrderDBResponse;
    type Id = FoodOrderId;
    type Filter = FoodOrderFilter;

    #[instrument(skip(self, request), fields(member_id = %abbrev_uuid(&request.member_id), lines = request.lines.len()), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id: FoodOrderId;
        {
            let mut tx = self.db.begin().await?;

            id = sqlx::query_scalar(
                r#"
                INSERT INTO food_orders (member_id, ordered_by, order_date, total_amount, remarks)
                VALUES ($1, $2, COALESCE($3, CURRENT_DATE), $4, $5)
                RETURNING id
                "#,
            )
            .bind(request.member_id)
            .bind(request.ordered_by)
            .bind(request.order_date)
            .bind(order_total(&request.lines))
            .bind(&request.remarks)
            .fetch_one(&mut *tx)
            .await?;

            insert_lines(&mut tx, id, &request.lines).await?;
            tx.commit().await?;
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let row = sqlx::query_as::<_, FoodOrderRow>(&format!("{SELECT_ORDERS} WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match row {
            Some(row) => Ok(self.with_lines(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, FoodOrderRow>(&format!("{SELECT_ORDERS} WHERE o.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(self.with_lines(rows).await?.into_iter().map(|o| (o.id, o)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(SELECT_ORDERS);
        query.push(" WHERE TRUE");
        if let Some(date) = filter.order_date {
            query.push(" AND o.order_date = ").push_bind(date);
        }
        if let Some(is_billed) = filter.is_billed {
            query.push(" AND o.is_billed = ").push_bind(is_billed);
        }
        if let Some(member_id) = filter.member_id {
            query.push(" AND o.member_id = ").push_bind(member_id);
        }
        if let Some(lifecycle) = filter.lifecycle {
            query.push(" AND o.lifecycle = ").push_bind(lifecycle);
        }
        query.push(" ORDER BY o.order_date DESC, o.created_at DESC");

        let rows = query.build_query_as::<FoodOrderRow>().fetch_all(&mut *self.db).await?;
        self.with_lines(rows).await
    }

    /// Soft delete
    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("UPDATE food_orders SET lifecycle = 'INACTIVE', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(order_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        {
            let mut tx = self.db.begin().await?;

            let total = request.lines.as_deref().map(order_total);
            let updated = sqlx::query(
                r#"
                UPDATE food_orders SET
                    remarks = COALESCE($2, remarks),
                    total_amount = COALESCE($3, total_amount),
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&request.remarks)
            .bind(total)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(DbError::NotFound);
            }

            if let Some(lines) = &request.lines {
                sqlx::query("DELETE FROM food_order_items WHERE order_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                insert_lines(&mut tx, id, lines).await?;
            }
            tx.commit().await?;
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{FoodItems, Members};
    use crate::db::models::{
        food_items::{FoodItemCreateDBRequest, FoodItemUpdateDBRequest, MealCategory},
        members::MemberCreateDBRequest,
    };
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    async fn member(conn: &mut PgConnection) -> MemberId {
        Members::new(conn)
            .create(&MemberCreateDBRequest {
                member_code: "M-001".to_string(),
                full_name: "Hamza Ali".to_string(),
                cnic: "35202-1234567-1".to_string(),
                phone: "0300-1234567".to_string(),
                guardian_name: "Ali Raza".to_string(),
                guardian_phone: None,
                institute_name: None,
                address: None,
                join_date: None,
                created_by: None,
            })
            .await
            .unwrap()
            .id
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_lines_keep_order_and_total(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let member_id = member(&mut conn).await;
        let paratha = FoodItems::new(&mut conn)
            .create(&FoodItemCreateDBRequest {
                name: "Paratha".to_string(),
                category: MealCategory::Breakfast,
                price: Decimal::from(50),
                created_by: None,
            })
            .await
            .unwrap();
        let chai = FoodItems::new(&mut conn)
            .create(&FoodItemCreateDBRequest {
                name: "Chai".to_string(),
                category: MealCategory::Breakfast,
                price: Decimal::from(200),
                created_by: None,
            })
            .await
            .unwrap();

        let lines = vec![
            FoodOrderLine {
                food_item_id: paratha.id,
                name: paratha.name.clone(),
                category: paratha.category,
                price: paratha.price,
                quantity: 2,
            },
            FoodOrderLine {
                food_item_id: chai.id,
                name: chai.name.clone(),
                category: chai.category,
                price: chai.price,
                quantity: 1,
            },
        ];

        let mut repo = FoodOrders::new(&mut conn);
        let order = repo
            .create(&FoodOrderCreateDBRequest {
                member_id,
                ordered_by: None,
                order_date: None,
                lines: lines.clone(),
                remarks: None,
            })
            .await
            .unwrap();
        assert_eq!(order.items, lines);
        assert_eq!(order.total_amount, Decimal::from(300));
        assert!(!order.is_billed);

        // Catalog edits never reach an existing order
        FoodItems::new(&mut conn)
            .update(
                paratha.id,
                &FoodItemUpdateDBRequest {
                    price: Some(Decimal::from(80)),
                    name: Some("Aloo Paratha".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let reloaded = FoodOrders::new(&mut conn).get_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(reloaded.items[0].price, Decimal::from(50));
        assert_eq!(reloaded.items[0].name, "Paratha");
        assert_eq!(reloaded.total_amount, Decimal::from(300));

        // Changing quantities recomputes the total
        let mut fewer = lines.clone();
        fewer[0].quantity = 1;
        let updated = FoodOrders::new(&mut conn)
            .update(
                order.id,
                &FoodOrderUpdateDBRequest {
                    remarks: Some("one less".to_string()),
                    lines: Some(fewer),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.total_amount, Decimal::from(250));
        assert_eq!(updated.items.len(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_mark_billed_and_release(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let member_id = member(&mut conn).await;

        let mut repo = FoodOrders::new(&mut conn);
        let a = repo
            .create(&FoodOrderCreateDBRequest {
                member_id,
                ordered_by: None,
                order_date: None,
                lines: vec![],
                remarks: None,
            })
            .await
            .unwrap();
        let b = repo
            .create(&FoodOrderCreateDBRequest {
                member_id,
                ordered_by: None,
                order_date: None,
                lines: vec![],
                remarks: Some("second".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(repo.lock_unbilled_for_member(member_id).await.unwrap().len(), 2);
        assert_eq!(repo.mark_billed(&[a.id], None).await.unwrap(), 1);

        let unbilled = repo.lock_unbilled_for_member(member_id).await.unwrap();
        assert_eq!(unbilled.len(), 1);
        assert_eq!(unbilled[0].id, b.id);

        let billed = repo
            .list(&FoodOrderFilter {
                is_billed: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(billed.len(), 1);
        assert!(billed[0].bill_id.is_none());
    }
}
