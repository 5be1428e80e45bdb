use crate::ast::query::{OrderDirection, QueryExpression};
use crate::ast::{Ident, TableIdent};
use crate::expr::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnDuplicate {
    #[default]
    Error,
    Ignore,
    Replace,
}

/// `CREATE [TEMPORARY] TABLE [IF NOT EXISTS] <name> ...`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub temporary: bool,
    pub if_not_exists: bool,
    pub table: TableIdent,
    pub elements: Vec<TableElement>,
    pub options: Vec<TableOption>,
    pub partitioning: Option<PartitionClause>,
    /// IGNORE/REPLACE for `CREATE TABLE ... SELECT`.
    pub on_duplicate: OnDuplicate,
    /// `AS SELECT ...`
    pub query: Option<QueryExpression>,
    /// `LIKE <table>`
    pub like: Option<TableIdent>,
}

impl CreateTableStatement {
    pub fn new(table: TableIdent) -> Self {
        CreateTableStatement {
            temporary: false,
            if_not_exists: false,
            table,
            elements: Vec::new(),
            options: Vec::new(),
            partitioning: None,
            on_duplicate: OnDuplicate::Error,
            query: None,
            like: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableElement {
    Column(ColumnDef),
    Index(IndexDef),
    ForeignKey(ForeignKeyDef),
    Check(CheckConstraintDef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPlace {
    First,
    After(Ident),
}

/// `<name> <field def> [REFERENCES ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: Ident,
    pub field: FieldDef,
    /// Inline REFERENCES clause. Parsed but has no effect.
    pub references: Option<ReferencesClause>,
    /// Position for ALTER TABLE.
    pub place: Option<ColumnPlace>,
}

impl ColumnDef {
    pub fn new(name: &str, data_type: DataType) -> Self {
        ColumnDef {
            name: Ident::new(name),
            field: FieldDef {
                data_type,
                attributes: Vec::new(),
                generated: None,
            },
            references: None,
            place: None,
        }
    }

    pub fn with_attribute(mut self, attr: ColumnAttribute) -> Self {
        self.field.attributes.push(attr);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub data_type: DataType,
    pub attributes: Vec<ColumnAttribute>,
    /// `[GENERATED ALWAYS] AS (<expr>) [VIRTUAL|STORED]`
    pub generated: Option<GeneratedColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedColumn {
    pub expr: Expr,
    pub stored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Decimal,
    Float,
    Double,
    Bit,
    Char,
    Varchar,
    Binary,
    VarBinary,
    Text,
    Blob,
    Enum,
    Set,
    Json,
    Date,
    Time,
    DateTime,
    Timestamp,
    Year,
    Geometry,
    Point,
}

impl TypeName {
    /// If values of this type carry a character set.
    pub fn is_character(&self) -> bool {
        matches!(
            self,
            TypeName::Char | TypeName::Varchar | TypeName::Text | TypeName::Enum | TypeName::Set
        )
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, TypeName::Geometry | TypeName::Point)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataType {
    pub name: TypeName,
    pub length: Option<u64>,
    pub decimals: Option<u32>,
    pub unsigned: bool,
    pub zerofill: bool,
    /// `CHARACTER SET <name>` given with the type.
    pub charset: Option<String>,
    /// `BINARY` given with a character type.
    pub binary: bool,
    /// ENUM and SET members.
    pub values: Vec<String>,
}

impl DataType {
    pub fn new(name: TypeName) -> Self {
        DataType {
            name,
            length: None,
            decimals: None,
            unsigned: false,
            zerofill: false,
            charset: None,
            binary: false,
            values: Vec::new(),
        }
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_charset(mut self, charset: &str) -> Self {
        self.charset = Some(charset.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFormat {
    Default,
    Fixed,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnStorage {
    Default,
    Disk,
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnAttribute {
    Null,
    NotNull,
    /// `DEFAULT <expr>`
    Default(Expr),
    /// `ON UPDATE <expr>`
    OnUpdate(Expr),
    AutoIncrement,
    /// `[PRIMARY] KEY`
    PrimaryKey,
    /// `UNIQUE [KEY]`
    Unique,
    Comment(String),
    Collate(String),
    ColumnFormat(ColumnFormat),
    Storage(ColumnStorage),
    Srid(u64),
    /// `VISIBLE` (true) or `INVISIBLE` (false).
    Visibility(bool),
    Check(CheckConstraintDef),
    EngineAttribute(String),
    SecondaryEngineAttribute(String),
    /// `NOT SECONDARY`
    NotSecondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Primary,
    Unique,
    Multiple,
    Fulltext,
    Spatial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAlgorithm {
    BTree,
    Hash,
    RTree,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOption {
    Algorithm(IndexAlgorithm),
    KeyBlockSize(u64),
    Comment(String),
    /// `VISIBLE` (true) or `INVISIBLE` (false).
    Visibility(bool),
    /// `WITH PARSER <name>`
    Parser(String),
    EngineAttribute(String),
    SecondaryEngineAttribute(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyPartTarget {
    /// `<column>[(<prefix length>)]`
    Column { name: Ident, prefix: Option<u32> },
    /// `(<expr>)` for functional key parts.
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyPart {
    pub target: KeyPartTarget,
    pub order: OrderDirection,
}

impl KeyPart {
    pub fn column(name: &str) -> Self {
        KeyPart {
            target: KeyPartTarget::Column {
                name: Ident::new(name),
                prefix: None,
            },
            order: OrderDirection::Unspecified,
        }
    }

    pub fn with_order(mut self, order: OrderDirection) -> Self {
        self.order = order;
        self
    }

    /// If ASC or DESC was written.
    pub fn is_explicit(&self) -> bool {
        matches!(self.order, OrderDirection::Asc | OrderDirection::Desc)
    }
}

/// `<key type> [<name>] [USING <algorithm>] (<key parts>) [<options>]`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    pub key_type: KeyType,
    pub name: Option<Ident>,
    pub algorithm: Option<IndexAlgorithm>,
    pub columns: Vec<KeyPart>,
    pub options: Vec<IndexOption>,
}

impl IndexDef {
    pub fn new(key_type: KeyType, columns: Vec<KeyPart>) -> Self {
        IndexDef {
            key_type,
            name: None,
            algorithm: None,
            columns,
            options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FkAction {
    #[default]
    Undefined,
    Restrict,
    Cascade,
    SetNull,
    NoAction,
    SetDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FkMatch {
    #[default]
    Undefined,
    Full,
    Partial,
    Simple,
}

/// `REFERENCES <table> (<columns>) [MATCH ...] [ON DELETE ...] [ON UPDATE ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencesClause {
    pub table: TableIdent,
    pub columns: Vec<Ident>,
    pub match_option: FkMatch,
    pub on_update: FkAction,
    pub on_delete: FkAction,
}

impl ReferencesClause {
    pub fn new(table: TableIdent, columns: Vec<Ident>) -> Self {
        ReferencesClause {
            table,
            columns,
            match_option: FkMatch::Undefined,
            on_update: FkAction::Undefined,
            on_delete: FkAction::Undefined,
        }
    }
}

/// `[CONSTRAINT <name>] FOREIGN KEY [<key name>] (<columns>) <references>`
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDef {
    pub constraint_name: Option<Ident>,
    pub key_name: Option<Ident>,
    pub columns: Vec<KeyPart>,
    pub references: ReferencesClause,
}

/// `[CONSTRAINT <name>] CHECK (<expr>) [[NOT] ENFORCED]`
#[derive(Debug, Clone, PartialEq)]
pub struct CheckConstraintDef {
    pub name: Option<Ident>,
    pub expr: Expr,
    pub enforced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ternary {
    Default,
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFormat {
    Default,
    Fixed,
    Dynamic,
    Compressed,
    Redundant,
    Compact,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableOption {
    Engine(String),
    /// `SECONDARY_ENGINE = <name>|NULL`
    SecondaryEngine(Option<String>),
    /// `[DEFAULT] CHARACTER SET = <name>|DEFAULT`
    DefaultCharset(Option<String>),
    /// `[DEFAULT] COLLATE = <name>|DEFAULT`
    DefaultCollation(Option<String>),
    AutoIncrement(u64),
    Comment(String),
    RowFormat(RowFormat),
    StatsAutoRecalc(Ternary),
    StatsPersistent(Ternary),
    StatsSamplePages(u32),
    /// `UNION = (<tables>)` for merge tables.
    Union(Vec<TableIdent>),
    KeyBlockSize(u64),
    Compression(String),
    Encryption(String),
    MaxRows(u64),
    MinRows(u64),
    AvgRowLength(u64),
    Checksum(bool),
    Tablespace(String),
    DataDirectory(String),
    IndexDirectory(String),
    EngineAttribute(String),
    SecondaryEngineAttribute(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartitionMethod {
    Hash { linear: bool, expr: Expr },
    Key { linear: bool, columns: Vec<Ident> },
    Range(Expr),
    RangeColumns(Vec<Ident>),
    List(Expr),
    ListColumns(Vec<Ident>),
}

impl PartitionMethod {
    /// RANGE and LIST need every partition listed with its values.
    pub fn requires_definitions(&self) -> bool {
        matches!(
            self,
            PartitionMethod::Range(_)
                | PartitionMethod::RangeColumns(_)
                | PartitionMethod::List(_)
                | PartitionMethod::ListColumns(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartitionValues {
    /// HASH and KEY partitions.
    None,
    /// `VALUES LESS THAN (...)`, `None` entries are MAXVALUE.
    LessThan(Vec<Option<Expr>>),
    /// `VALUES IN (...)`
    In(Vec<Vec<Expr>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartitionOption {
    Engine(String),
    Comment(String),
    DataDirectory(String),
    IndexDirectory(String),
    MaxRows(u64),
    MinRows(u64),
    Tablespace(String),
    NodeGroup(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubpartitionDef {
    pub name: Ident,
    pub options: Vec<PartitionOption>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionDef {
    pub name: Ident,
    pub values: PartitionValues,
    pub options: Vec<PartitionOption>,
    pub subpartitions: Vec<SubpartitionDef>,
}

impl PartitionDef {
    pub fn new(name: &str, values: PartitionValues) -> Self {
        PartitionDef {
            name: Ident::new(name),
            values,
            options: Vec::new(),
            subpartitions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubpartitionClause {
    /// Only HASH and KEY are valid here.
    pub method: PartitionMethod,
    pub count: Option<u32>,
}

/// `PARTITION BY <method> [PARTITIONS <n>] [SUBPARTITION BY ...] [(<defs>)]`
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionClause {
    pub method: PartitionMethod,
    pub count: Option<u32>,
    pub subpartition: Option<SubpartitionClause>,
    pub definitions: Vec<PartitionDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlterAlgorithm {
    #[default]
    Default,
    Instant,
    Inplace,
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlterLock {
    #[default]
    Default,
    None,
    Shared,
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validation {
    #[default]
    Default,
    With,
    Without,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionNames {
    All,
    Names(Vec<Ident>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartitionAction {
    /// `ADD PARTITION (<defs>)` or `ADD PARTITION PARTITIONS <n>`
    Add {
        definitions: Vec<PartitionDef>,
        count: Option<u32>,
    },
    Drop(Vec<Ident>),
    Rebuild(PartitionNames),
    Optimize(PartitionNames),
    Analyze(PartitionNames),
    Check(PartitionNames),
    Repair(PartitionNames),
    Coalesce(u32),
    Truncate(PartitionNames),
    /// `REORGANIZE PARTITION <names> INTO (<defs>)`
    Reorganize {
        names: Vec<Ident>,
        into: Vec<PartitionDef>,
    },
    /// `EXCHANGE PARTITION <name> WITH TABLE <table> [WITH|WITHOUT VALIDATION]`
    Exchange {
        name: Ident,
        table: TableIdent,
        validation: Validation,
    },
    RemovePartitioning,
    /// `PARTITION BY ...` given in ALTER TABLE.
    PartitionBy(PartitionClause),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterAction {
    AddColumn(ColumnDef),
    AddIndex(IndexDef),
    AddForeignKey(ForeignKeyDef),
    AddCheck(CheckConstraintDef),
    /// `CHANGE <old> <new def>` and `MODIFY <def>` (same name).
    ChangeColumn {
        old_name: Ident,
        column: ColumnDef,
    },
    /// `ALTER COLUMN <name> SET DEFAULT <expr>|DROP DEFAULT`
    AlterColumnDefault {
        name: Ident,
        default: Option<Expr>,
    },
    AlterColumnVisibility {
        name: Ident,
        visible: bool,
    },
    AlterIndexVisibility {
        name: Ident,
        visible: bool,
    },
    AlterCheck {
        name: Ident,
        enforced: bool,
    },
    DropColumn(Ident),
    DropIndex(Ident),
    DropPrimaryKey,
    DropForeignKey(Ident),
    DropCheck(Ident),
    DropConstraint(Ident),
    RenameColumn {
        old_name: Ident,
        new_name: Ident,
    },
    RenameIndex {
        old_name: Ident,
        new_name: Ident,
    },
    /// `RENAME [TO|AS] <table>`
    RenameTable(TableIdent),
    TableOption(TableOption),
    /// `CONVERT TO CHARACTER SET <charset>|DEFAULT [COLLATE <collation>]`
    ConvertToCharset {
        charset: Option<String>,
        collation: Option<String>,
    },
    EnableKeys,
    DisableKeys,
    Force,
    Partition(PartitionAction),
}

impl AlterAction {
    pub fn is_rename_table(&self) -> bool {
        matches!(self, AlterAction::RenameTable(_))
    }
}

/// `ALTER TABLE <table> <actions> [, ALGORITHM = ...] [, LOCK = ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableStatement {
    pub table: TableIdent,
    pub actions: Vec<AlterAction>,
    pub algorithm: AlterAlgorithm,
    pub lock: AlterLock,
    pub validation: Validation,
}

impl AlterTableStatement {
    pub fn new(table: TableIdent, actions: Vec<AlterAction>) -> Self {
        AlterTableStatement {
            table,
            actions,
            algorithm: AlterAlgorithm::Default,
            lock: AlterLock::Default,
            validation: Validation::Default,
        }
    }
}

/// `CREATE [UNIQUE|FULLTEXT|SPATIAL] INDEX <name> ON <table> (...)`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStatement {
    pub index: IndexDef,
    pub table: TableIdent,
    pub algorithm: AlterAlgorithm,
    pub lock: AlterLock,
}

/// `DROP INDEX <name> ON <table>`
#[derive(Debug, Clone, PartialEq)]
pub struct DropIndexStatement {
    pub name: Ident,
    pub table: TableIdent,
    pub algorithm: AlterAlgorithm,
    pub lock: AlterLock,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistogramCommand {
    Update {
        columns: Vec<Ident>,
        buckets: Option<u32>,
    },
    Drop {
        columns: Vec<Ident>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MaintenanceKind {
    Analyze { histogram: Option<HistogramCommand> },
    Check,
    Optimize,
    Repair,
    Truncate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableMaintenanceStatement {
    pub kind: MaintenanceKind,
    pub tables: Vec<TableIdent>,
    /// `NO_WRITE_TO_BINLOG` or `LOCAL`.
    pub no_write_to_binlog: bool,
}
