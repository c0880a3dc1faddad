/// Scan builder: every item of a table or index, optionally filtered
use super::{check_conditions, check_consistency, check_limit, check_projection};
use crate::error::{Error, Result};
use crate::expression::{Condition, ExpressionWriter};
use crate::plan::{Consistency, Operation, PageCursor, RequestPlan, Segment};
use crate::schema::ShapeDescriptor;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Scan {
    shape: Arc<ShapeDescriptor>,
    index: Option<String>,
    filters: Vec<Condition>,
    projection: Vec<String>,
    consistency: Consistency,
    limit: Option<u32>,
    cursor: Option<PageCursor>,
    segment: Option<Segment>,
    pending: Option<Error>,
}

impl Scan {
    pub(crate) fn new(shape: Arc<ShapeDescriptor>) -> Self {
        Self {
            shape,
            index: None,
            filters: Vec::new(),
            projection: Vec::new(),
            consistency: Consistency::Eventual,
            limit: None,
            cursor: None,
            segment: None,
            pending: None,
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.filters.push(condition);
        self
    }

    pub fn project<I, N>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.projection.extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn consistent_read(self) -> Self {
        self.consistency(Consistency::Strong)
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_from(mut self, cursor: PageCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn start_from_token(mut self, token: &str) -> Self {
        match PageCursor::from_token(token) {
            Ok(cursor) => self.cursor = Some(cursor),
            Err(e) => self.pending = Some(e),
        }
        self
    }

    /// Set segment for parallel scan
    pub fn segment(mut self, segment: u32, total_segments: u32) -> Self {
        self.segment = Some(Segment {
            segment,
            total: total_segments,
        });
        self
    }

    pub fn build(&self) -> Result<RequestPlan> {
        if let Some(e) = &self.pending {
            return Err(e.clone());
        }

        let shape = &self.shape;
        shape.key_schema(self.index.as_deref())?;
        check_consistency(shape, self.index.as_deref(), self.consistency)?;
        check_conditions(shape, &self.filters)?;
        check_projection(shape, &self.projection)?;
        check_limit(self.limit)?;
        if let Some(seg) = self.segment {
            if seg.total == 0 || seg.segment >= seg.total {
                return Err(Error::InvalidQuery(format!(
                    "segment {} is out of range for {} total segments",
                    seg.segment, seg.total
                )));
            }
        }
        if let Some(cursor) = &self.cursor {
            cursor.check_shape(&shape.name)?;
        }

        let mut writer = ExpressionWriter::new();
        let filter = writer.conjunction(&self.filters);
        let projection = (!self.projection.is_empty()).then(|| writer.projection(&self.projection));
        let (names, values) = writer.finish();

        let mut plan = RequestPlan::new(&shape.name, &shape.table, Operation::Scan);
        plan.filter = filter;
        plan.projection = projection;
        plan.names = names;
        plan.values = values;
        plan.index = self.index.clone();
        plan.consistency = self.consistency;
        plan.limit = self.limit;
        plan.cursor = self.cursor.clone();
        plan.segment = self.segment;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{orders, Order};

    #[test]
    fn test_scan_builder() {
        let plan = orders()
            .scan()
            .filter(Order::ORDER_ID.begins_with("A"))
            .filter(Order::TOTAL.ge(10))
            .limit(100)
            .build()
            .unwrap();

        assert_eq!(plan.operation, Operation::Scan);
        assert_eq!(plan.filter.as_deref(), Some("(begins_with(#n0, :v0)) AND (#n1 >= :v1)"));
        assert_eq!(plan.limit, Some(100));
    }

    #[test]
    fn test_scan_segment() {
        let plan = orders().scan().segment(1, 4).build().unwrap();
        assert_eq!(plan.segment, Some(Segment { segment: 1, total: 4 }));

        assert!(matches!(orders().scan().segment(4, 4).build(), Err(Error::InvalidQuery(_))));
        assert!(matches!(orders().scan().segment(0, 0).build(), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_scan_index_rules() {
        assert!(orders().scan().index("byCustomer").build().is_ok());
        assert!(matches!(
            orders().scan().index("byCustomer").consistent_read().build(),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(orders().scan().index("missing").build(), Err(Error::InvalidQuery(_))));
    }
}
