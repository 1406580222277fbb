use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241101_000001_create_clients_and_projects_tables::Migration),
            Box::new(m20241101_000002_create_materials_and_jobs_tables::Migration),
            Box::new(m20241101_000003_create_job_materials_table::Migration),
            Box::new(m20241101_000004_create_supplier_prices_table::Migration),
            Box::new(m20241101_000005_create_boq_jobs_table::Migration),
        ]
    }
}

mod m20241101_000001_create_clients_and_projects_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20241101_000001_create_clients_and_projects_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Clients::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Clients::ClientId)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Clients::Name).string().not_null())
                        .col(ColumnDef::new(Clients::Email).string().null())
                        .col(ColumnDef::new(Clients::Tel).string().null())
                        .col(ColumnDef::new(Clients::Address).string().null())
                        .col(ColumnDef::new(Clients::TaxId).string().null())
                        .col(
                            ColumnDef::new(Clients::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Projects::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Projects::ProjectId)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Projects::Name).string().not_null())
                        .col(ColumnDef::new(Projects::Description).text().null())
                        .col(ColumnDef::new(Projects::Address).string().null())
                        .col(
                            ColumnDef::new(Projects::Status)
                                .string()
                                .not_null()
                                .default("planning"),
                        )
                        .col(ColumnDef::new(Projects::ClientId).uuid().null())
                        .col(
                            ColumnDef::new(Projects::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Projects::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_projects_client_id")
                                .from(Projects::Table, Projects::ClientId)
                                .to(Clients::Table, Clients::ClientId)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Projects::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Clients::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Clients {
        Table,
        ClientId,
        Name,
        Email,
        Tel,
        Address,
        TaxId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Projects {
        Table,
        ProjectId,
        Name,
        Description,
        Address,
        Status,
        ClientId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20241101_000002_create_materials_and_jobs_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20241101_000002_create_materials_and_jobs_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Materials::MaterialId)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Materials::Name).string().not_null())
                        .col(ColumnDef::new(Materials::Unit).string().not_null())
                        .col(
                            ColumnDef::new(Materials::ReferencePrice)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Materials::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Jobs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Jobs::JobId).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Jobs::Name).string().not_null())
                        .col(ColumnDef::new(Jobs::Description).text().null())
                        .col(ColumnDef::new(Jobs::Unit).string().not_null())
                        .col(
                            ColumnDef::new(Jobs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Jobs::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Jobs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Materials::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Materials {
        Table,
        MaterialId,
        Name,
        Unit,
        ReferencePrice,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Jobs {
        Table,
        JobId,
        Name,
        Description,
        Unit,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20241101_000003_create_job_materials_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20241101_000003_create_job_materials_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // The composite primary key doubles as the pair uniqueness constraint
            manager
                .create_table(
                    Table::create()
                        .table(JobMaterials::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(JobMaterials::JobId).uuid().not_null())
                        .col(ColumnDef::new(JobMaterials::MaterialId).string().not_null())
                        .col(ColumnDef::new(JobMaterials::Quantity).decimal().not_null())
                        .col(
                            ColumnDef::new(JobMaterials::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(JobMaterials::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .name("pk_job_materials")
                                .col(JobMaterials::JobId)
                                .col(JobMaterials::MaterialId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_job_materials_job_id")
                                .from(JobMaterials::Table, JobMaterials::JobId)
                                .to(Jobs::Table, Jobs::JobId)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_job_materials_material_id")
                                .from(JobMaterials::Table, JobMaterials::MaterialId)
                                .to(Materials::Table, Materials::MaterialId)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_job_materials_material_id")
                        .table(JobMaterials::Table)
                        .col(JobMaterials::MaterialId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(JobMaterials::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum JobMaterials {
        Table,
        JobId,
        MaterialId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Jobs {
        Table,
        JobId,
    }

    #[derive(DeriveIden)]
    enum Materials {
        Table,
        MaterialId,
    }
}

mod m20241101_000004_create_supplier_prices_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20241101_000004_create_supplier_prices_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SupplierPrices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SupplierPrices::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierPrices::MaterialId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierPrices::SupplierName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplierPrices::Price).decimal().not_null())
                        .col(
                            ColumnDef::new(SupplierPrices::ObservedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierPrices::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_supplier_prices_material_id")
                                .from(SupplierPrices::Table, SupplierPrices::MaterialId)
                                .to(Materials::Table, Materials::MaterialId)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_supplier_prices_material_observed")
                        .table(SupplierPrices::Table)
                        .col(SupplierPrices::MaterialId)
                        .col(SupplierPrices::ObservedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SupplierPrices::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SupplierPrices {
        Table,
        Id,
        MaterialId,
        SupplierName,
        Price,
        ObservedAt,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Materials {
        Table,
        MaterialId,
    }
}

mod m20241101_000005_create_boq_jobs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20241101_000005_create_boq_jobs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BoqJobs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(BoqJobs::ProjectId).uuid().not_null())
                        .col(ColumnDef::new(BoqJobs::JobId).uuid().not_null())
                        .col(ColumnDef::new(BoqJobs::Quantity).decimal().not_null())
                        .col(
                            ColumnDef::new(BoqJobs::LaborCost)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(BoqJobs::SellingPrice)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(BoqJobs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BoqJobs::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .name("pk_boq_jobs")
                                .col(BoqJobs::ProjectId)
                                .col(BoqJobs::JobId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_boq_jobs_project_id")
                                .from(BoqJobs::Table, BoqJobs::ProjectId)
                                .to(Projects::Table, Projects::ProjectId)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_boq_jobs_job_id")
                                .from(BoqJobs::Table, BoqJobs::JobId)
                                .to(Jobs::Table, Jobs::JobId)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_boq_jobs_job_id")
                        .table(BoqJobs::Table)
                        .col(BoqJobs::JobId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BoqJobs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BoqJobs {
        Table,
        ProjectId,
        JobId,
        Quantity,
        LaborCost,
        SellingPrice,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Projects {
        Table,
        ProjectId,
    }

    #[derive(DeriveIden)]
    enum Jobs {
        Table,
        JobId,
    }
}
