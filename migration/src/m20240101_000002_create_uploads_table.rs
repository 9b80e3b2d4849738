use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Uploads::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Uploads::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Uploads::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Uploads::Filename).string().not_null().unique_key())
                    .col(ColumnDef::new(Uploads::OriginalFilename).string().not_null())
                    .col(ColumnDef::new(Uploads::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(Uploads::Columns).json().not_null())
                    .col(ColumnDef::new(Uploads::RowCount).big_integer().not_null())
                    .col(ColumnDef::new(Uploads::ChartConfigs).json().not_null())
                    .col(ColumnDef::new(Uploads::AiSummary).text().null())
                    .col(ColumnDef::new(Uploads::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Uploads::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_uploads_owner_id")
                            .from(Uploads::Table, Uploads::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_uploads_owner_created")
                    .table(Uploads::Table)
                    .col(Uploads::OwnerId)
                    .col(Uploads::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Uploads::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Uploads {
    Table,
    Id,
    OwnerId,
    Filename,
    OriginalFilename,
    FileSize,
    Columns,
    RowCount,
    ChartConfigs,
    AiSummary,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
