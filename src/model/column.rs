//! Column and relation declarations.

/// Storage type of a column. DDL and bind casts are derived per dialect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    BigInt,
    Text,
    Varchar(u32),
    Boolean,
    Float,
    Timestamp,
    Date,
    Uuid,
    Json,
}

impl ColumnType {
    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::BigInt)
    }

    /// Types that the any-driver cannot decode natively on PostgreSQL; selected as text.
    pub fn selected_as_text(&self) -> bool {
        matches!(
            self,
            ColumnType::Timestamp | ColumnType::Date | ColumnType::Uuid | ColumnType::Json
        )
    }
}

#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub primary_key: bool,
    pub unique: bool,
    pub index: bool,
    pub nullable: bool,
    /// SQL default expression, emitted verbatim in DDL.
    pub default: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Column {
            name: name.into(),
            ty,
            primary_key: false,
            unique: false,
            index: false,
            nullable: true,
            default: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn big_int(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::BigInt)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn varchar(name: impl Into<String>, len: u32) -> Self {
        Self::new(name, ColumnType::Varchar(len))
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Float)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Timestamp)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Date)
    }

    pub fn uuid(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Uuid)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Json)
    }

    /// Marks the column as the primary key (implies NOT NULL).
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Integer primary keys are generated by the database.
    pub fn is_generated(&self) -> bool {
        self.primary_key && self.ty.is_integer()
    }

    /// Column may be omitted from an INSERT.
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.is_generated()
    }
}

/// Direction of a relation, seen from the declaring model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationKind {
    /// Our column holds the key of one target row.
    ManyToOne,
    /// Target rows hold our key.
    OneToMany,
}

#[derive(Clone, Debug)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    pub local_column: String,
    pub target: String,
    pub remote_column: String,
}

impl Relation {
    /// `post.author`: `post.user_id` references `user.id`.
    pub fn many_to_one(
        name: impl Into<String>,
        local_column: impl Into<String>,
        target: impl Into<String>,
        remote_column: impl Into<String>,
    ) -> Self {
        Relation {
            name: name.into(),
            kind: RelationKind::ManyToOne,
            local_column: local_column.into(),
            target: target.into(),
            remote_column: remote_column.into(),
        }
    }

    /// `user.posts`: every `post` whose `user_id` equals `user.id`.
    pub fn one_to_many(
        name: impl Into<String>,
        local_column: impl Into<String>,
        target: impl Into<String>,
        remote_column: impl Into<String>,
    ) -> Self {
        Relation {
            name: name.into(),
            kind: RelationKind::OneToMany,
            local_column: local_column.into(),
            target: target.into(),
            remote_column: remote_column.into(),
        }
    }
}
