use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_products_table::Migration),
            Box::new(m20240301_000002_create_stock_movements_table::Migration),
            Box::new(m20240301_000003_create_register_tables::Migration),
            Box::new(m20240301_000004_create_discrepancy_authorizations_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Products::Sku)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Kind).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Products::UnitPrice)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::OnHand)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::MinStock).integer().null())
                        .col(
                            ColumnDef::new(Products::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_active")
                        .table(Products::Table)
                        .col(Products::Active)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Products {
        Table,
        Id,
        Sku,
        Name,
        Kind,
        UnitPrice,
        OnHand,
        MinStock,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_stock_movements_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_stock_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::Kind)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::QuantityDelta)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::OnHandBefore)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::OnHandAfter)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Reason).string().not_null())
                        .col(ColumnDef::new(StockMovements::Operator).string().not_null())
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_product_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::ProductId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum StockMovements {
        Table,
        Id,
        ProductId,
        Kind,
        QuantityDelta,
        OnHandBefore,
        OnHandAfter,
        Reason,
        Operator,
        CreatedAt,
    }
}

mod m20240301_000003_create_register_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_register_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RegisterSessions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RegisterSessions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::BusinessDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::State)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::OpeningVesCash)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::OpeningUsdCash)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::OpeningTransfer)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::IngressVesCash)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::IngressUsdCash)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::IngressTransfer)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::EgressVesCash)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::EgressUsdCash)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::EgressTransfer)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::RateOfficial)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::RateParallel)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::OpenedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RegisterSessions::OpenedBy).string().not_null())
                        .col(ColumnDef::new(RegisterSessions::OpeningNote).string().null())
                        .col(
                            ColumnDef::new(RegisterSessions::CountedVesCash)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::CountedUsdCash)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(RegisterSessions::CountedTransfer)
                                .decimal()
                                .null(),
                        )
                        .col(ColumnDef::new(RegisterSessions::ClosedAt).timestamp().null())
                        .col(ColumnDef::new(RegisterSessions::ClosedBy).string().null())
                        .col(ColumnDef::new(RegisterSessions::ClosingNote).string().null())
                        .to_owned(),
                )
                .await?;

            // One active drawer at a time is enforced in the service; the
            // index keeps the lookup cheap.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_register_sessions_state")
                        .table(RegisterSessions::Table)
                        .col(RegisterSessions::State)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RegisterTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RegisterTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RegisterTransactions::RegisterSessionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RegisterTransactions::Direction)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RegisterTransactions::Category)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RegisterTransactions::AmountVesCash)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RegisterTransactions::AmountUsdCash)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RegisterTransactions::AmountTransfer)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RegisterTransactions::ExchangeRate)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RegisterTransactions::ReceiptCode)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RegisterTransactions::DailySeq)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RegisterTransactions::CheckoutSessionId)
                                .uuid()
                                .null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(RegisterTransactions::CustomerName)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(RegisterTransactions::Note).string().null())
                        .col(
                            ColumnDef::new(RegisterTransactions::Operator)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RegisterTransactions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_register_transactions_session")
                                .from(
                                    RegisterTransactions::Table,
                                    RegisterTransactions::RegisterSessionId,
                                )
                                .to(RegisterSessions::Table, RegisterSessions::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_register_transactions_session_id")
                        .table(RegisterTransactions::Table)
                        .col(RegisterTransactions::RegisterSessionId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TransactionLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransactionLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionLines::TransactionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransactionLines::ProductId).uuid().null())
                        .col(
                            ColumnDef::new(TransactionLines::Description)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionLines::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionLines::UnitPrice)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionLines::Discount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(TransactionLines::Subtotal)
                                .decimal()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transaction_lines_transaction")
                                .from(TransactionLines::Table, TransactionLines::TransactionId)
                                .to(RegisterTransactions::Table, RegisterTransactions::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transaction_lines_transaction_id")
                        .table(TransactionLines::Table)
                        .col(TransactionLines::TransactionId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TransactionPayments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransactionPayments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionPayments::TransactionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionPayments::Method)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionPayments::Amount)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionPayments::Currency)
                                .string_len(8)
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransactionPayments::Bank).string().null())
                        .col(ColumnDef::new(TransactionPayments::Reference).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transaction_payments_transaction")
                                .from(
                                    TransactionPayments::Table,
                                    TransactionPayments::TransactionId,
                                )
                                .to(RegisterTransactions::Table, RegisterTransactions::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transaction_payments_transaction_id")
                        .table(TransactionPayments::Table)
                        .col(TransactionPayments::TransactionId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TransactionPayments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(TransactionLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RegisterTransactions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RegisterSessions::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum RegisterSessions {
        Table,
        Id,
        BusinessDate,
        State,
        OpeningVesCash,
        OpeningUsdCash,
        OpeningTransfer,
        IngressVesCash,
        IngressUsdCash,
        IngressTransfer,
        EgressVesCash,
        EgressUsdCash,
        EgressTransfer,
        RateOfficial,
        RateParallel,
        OpenedAt,
        OpenedBy,
        OpeningNote,
        CountedVesCash,
        CountedUsdCash,
        CountedTransfer,
        ClosedAt,
        ClosedBy,
        ClosingNote,
    }

    #[derive(Iden)]
    enum RegisterTransactions {
        Table,
        Id,
        RegisterSessionId,
        Direction,
        Category,
        AmountVesCash,
        AmountUsdCash,
        AmountTransfer,
        ExchangeRate,
        ReceiptCode,
        DailySeq,
        CheckoutSessionId,
        CustomerName,
        Note,
        Operator,
        CreatedAt,
    }

    #[derive(Iden)]
    enum TransactionLines {
        Table,
        Id,
        TransactionId,
        ProductId,
        Description,
        Quantity,
        UnitPrice,
        Discount,
        Subtotal,
    }

    #[derive(Iden)]
    enum TransactionPayments {
        Table,
        Id,
        TransactionId,
        Method,
        Amount,
        Currency,
        Bank,
        Reference,
    }
}

mod m20240301_000004_create_discrepancy_authorizations_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_discrepancy_authorizations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DiscrepancyAuthorizations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DiscrepancyAuthorizations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DiscrepancyAuthorizations::RegisterSessionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DiscrepancyAuthorizations::Bucket)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DiscrepancyAuthorizations::Expected)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DiscrepancyAuthorizations::Counted)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DiscrepancyAuthorizations::Difference)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DiscrepancyAuthorizations::AuthorizedBy)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DiscrepancyAuthorizations::Justification)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DiscrepancyAuthorizations::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_discrepancy_authorizations_session")
                                .from(
                                    DiscrepancyAuthorizations::Table,
                                    DiscrepancyAuthorizations::RegisterSessionId,
                                )
                                .to(RegisterSessions::Table, RegisterSessions::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_discrepancy_authorizations_session_id")
                        .table(DiscrepancyAuthorizations::Table)
                        .col(DiscrepancyAuthorizations::RegisterSessionId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(DiscrepancyAuthorizations::Table)
                        .to_owned(),
                )
                .await
        }
    }

    #[derive(Iden)]
    enum DiscrepancyAuthorizations {
        Table,
        Id,
        RegisterSessionId,
        Bucket,
        Expected,
        Counted,
        Difference,
        AuthorizedBy,
        Justification,
        CreatedAt,
    }

    #[derive(Iden)]
    enum RegisterSessions {
        Table,
        Id,
    }
}
