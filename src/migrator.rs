use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_inventory_items_table::Migration),
            Box::new(m20240301_000002_create_quantity_audit_logs_table::Migration),
            Box::new(m20240301_000003_create_identity_tables::Migration),
        ]
    }
}

mod m20240301_000001_create_inventory_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_inventory_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::OwnerId).string().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::Name)
                                .string_len(100)
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::Category).string().not_null())
                        .col(ColumnDef::new(InventoryItems::Unit).string().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::Quantity)
                                .decimal_len(14, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::ReorderThreshold)
                                .decimal_len(14, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::CostPrice)
                                .decimal_len(14, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Names are unique per owner, case-sensitive.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_items_owner_name")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::OwnerId)
                        .col(InventoryItems::Name)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_items_owner_created_at")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::OwnerId)
                        .col(InventoryItems::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum InventoryItems {
        Table,
        Id,
        OwnerId,
        Name,
        Category,
        Unit,
        Quantity,
        ReorderThreshold,
        CostPrice,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_quantity_audit_logs_table {

    use super::m20240301_000001_create_inventory_items_table::InventoryItems;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_quantity_audit_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(QuantityAuditLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(QuantityAuditLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuantityAuditLogs::ItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(QuantityAuditLogs::OwnerId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuantityAuditLogs::Change)
                                .decimal_len(14, 3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuantityAuditLogs::PreviousQuantity)
                                .decimal_len(14, 3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuantityAuditLogs::NewQuantity)
                                .decimal_len(14, 3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuantityAuditLogs::Reason)
                                .string_len(200)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(QuantityAuditLogs::IdempotencyKey)
                                .string_len(128)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(QuantityAuditLogs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_quantity_audit_logs_item_id")
                                .from(QuantityAuditLogs::Table, QuantityAuditLogs::ItemId)
                                .to(InventoryItems::Table, InventoryItems::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quantity_audit_logs_owner_created_at")
                        .table(QuantityAuditLogs::Table)
                        .col(QuantityAuditLogs::OwnerId)
                        .col(QuantityAuditLogs::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quantity_audit_logs_item_id")
                        .table(QuantityAuditLogs::Table)
                        .col(QuantityAuditLogs::ItemId)
                        .to_owned(),
                )
                .await?;

            // NULL keys never collide, so only keyed adjustments are deduplicated.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quantity_audit_logs_idempotency")
                        .table(QuantityAuditLogs::Table)
                        .col(QuantityAuditLogs::OwnerId)
                        .col(QuantityAuditLogs::ItemId)
                        .col(QuantityAuditLogs::IdempotencyKey)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(QuantityAuditLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum QuantityAuditLogs {
        Table,
        Id,
        ItemId,
        OwnerId,
        Change,
        PreviousQuantity,
        NewQuantity,
        Reason,
        IdempotencyKey,
        CreatedAt,
    }
}

mod m20240301_000003_create_identity_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_identity_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(UserProfiles::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UserProfiles::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::ClerkUserId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(UserProfiles::Email).string().null())
                        .col(ColumnDef::new(UserProfiles::FirstName).string().null())
                        .col(ColumnDef::new(UserProfiles::LastName).string().null())
                        .col(
                            ColumnDef::new(UserProfiles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SessionLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SessionLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SessionLogs::UserId).string().not_null())
                        .col(ColumnDef::new(SessionLogs::SessionId).string().not_null())
                        .col(ColumnDef::new(SessionLogs::Event).string().not_null())
                        .col(
                            ColumnDef::new(SessionLogs::Timestamp)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_session_logs_user_id")
                        .table(SessionLogs::Table)
                        .col(SessionLogs::UserId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SessionLogs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(UserProfiles::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum UserProfiles {
        Table,
        Id,
        ClerkUserId,
        Email,
        FirstName,
        LastName,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum SessionLogs {
        Table,
        Id,
        UserId,
        SessionId,
        Event,
        Timestamp,
    }
}
