use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `columns` and `chart_configs` hold JSON written from
/// [`crate::models::upload`] types; decode them with the helpers there.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "uploads")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: Uuid,
    #[sea_orm(unique)]
    pub filename: String,
    pub original_filename: String,
    pub file_size: i64,
    pub columns: Json,
    pub row_count: i64,
    pub chart_configs: Json,
    #[sea_orm(column_type = "Text", nullable)]
    pub ai_summary: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
