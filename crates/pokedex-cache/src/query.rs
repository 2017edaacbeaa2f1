// Turns the list screen's search/filter/sort state into SQL against `pokemon_list`
use rusqlite::types::Value;
use std::fmt;
use std::str::FromStr;

/// How the cached list is ordered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortType {
    #[default]
    Number,
    Name,
    Hp,
    Attack,
    Defense,
}

impl SortType {
    pub fn all() -> [SortType; 5] {
        [
            SortType::Number,
            SortType::Name,
            SortType::Hp,
            SortType::Attack,
            SortType::Defense,
        ]
    }

    /// ORDER BY clause. `number` breaks ties so page boundaries never shuffle.
    fn order_by(&self) -> &'static str {
        match self {
            SortType::Number => "number ASC",
            SortType::Name => "name ASC, number ASC",
            SortType::Hp => "hp DESC, number ASC",
            SortType::Attack => "attack DESC, number ASC",
            SortType::Defense => "defense DESC, number ASC",
        }
    }
}

impl fmt::Display for SortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortType::Number => "number",
            SortType::Name => "name",
            SortType::Hp => "hp",
            SortType::Attack => "attack",
            SortType::Defense => "defense",
        };
        f.write_str(name)
    }
}

impl FromStr for SortType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "number" | "no" | "#" => Ok(SortType::Number),
            "name" => Ok(SortType::Name),
            "hp" => Ok(SortType::Hp),
            "attack" | "atk" => Ok(SortType::Attack),
            "defense" | "def" => Ok(SortType::Defense),
            other => Err(format!(
                "unknown sort '{}' (expected number, name, hp, attack or defense)",
                other
            )),
        }
    }
}

/// Search, type filter and sort order for the list
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListQuery {
    pub search: String,
    pub sort: SortType,
    pub types: Vec<String>,
    pub favorites_only: bool,
}

impl ListQuery {
    pub fn new(search: impl Into<String>, sort: SortType, types: Vec<String>) -> Self {
        Self {
            search: search.into(),
            sort,
            types,
            favorites_only: false,
        }
    }

    pub fn favorites(mut self) -> Self {
        self.favorites_only = true;
        self
    }

    /// True when nothing narrows the list, i.e. it is the full remote catalog in some order
    pub fn is_unfiltered(&self) -> bool {
        self.search.trim().is_empty() && self.types.is_empty() && !self.favorites_only
    }

    /// WHERE clause (always present) plus its bound parameters
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut sql = String::from(" WHERE ");
        let mut params = Vec::new();

        let search = self.search.trim();
        if search.is_empty() {
            sql.push_str("1=1");
        } else {
            sql.push_str("(name LIKE ?)");
            params.push(Value::Text(format!("%{}%", search)));
        }

        if !self.types.is_empty() {
            let clauses = vec!["types LIKE ?"; self.types.len()];
            sql.push_str(" AND (");
            sql.push_str(&clauses.join(" OR "));
            sql.push(')');
            for kind in &self.types {
                params.push(Value::Text(format!("%{}%", kind)));
            }
        }

        if self.favorites_only {
            sql.push_str(" AND is_favorite = 1");
        }

        (sql, params)
    }

    /// SELECT for one page of results
    pub fn page_sql(&self, columns: &str, limit: usize, offset: usize) -> (String, Vec<Value>) {
        let (filter, mut params) = self.where_clause();
        let sql = format!(
            "SELECT {} FROM pokemon_list{} ORDER BY {} LIMIT ? OFFSET ?",
            columns,
            filter,
            self.sort.order_by()
        );
        params.push(Value::Integer(limit as i64));
        params.push(Value::Integer(offset as i64));
        (sql, params)
    }

    pub fn count_sql(&self) -> (String, Vec<Value>) {
        let (filter, params) = self.where_clause();
        (format!("SELECT COUNT(*) FROM pokemon_list{}", filter), params)
    }
}
