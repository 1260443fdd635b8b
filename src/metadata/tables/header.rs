use strum::{EnumCount, IntoEnumIterator};

use crate::{
    metadata::tables::{TableId, TableInfo},
    Result,
};

/// A tables stream with the byte range of every present table resolved.
pub struct TablesHeader<'a> {
    data: &'a [u8],
    info: TableInfo,
    offsets: Vec<(usize, usize)>,
}

impl<'a> TablesHeader<'a> {
    /// Parses the stream header and lays out all tables.
    ///
    /// # Errors
    /// Fails if the header is invalid or the declared rows do not fit in `data`.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        let info = TableInfo::new(data)?;

        let mut offsets = Vec::with_capacity(TableId::COUNT);
        let mut offset = info.rows_offset();
        for table in TableId::iter() {
            let row_size = table.row_size(&info);
            offsets.push((offset, row_size));

            let rows = info.get(table).rows as usize;
            offset = rows
                .checked_mul(row_size)
                .and_then(|size| offset.checked_add(size))
                .ok_or_else(|| malformed_error!("Table {:?} size overflows", table))?;
        }

        if offset > data.len() {
            return Err(malformed_error!(
                "Tables need {} bytes but the stream has {}",
                offset,
                data.len()
            ));
        }

        Ok(TablesHeader {
            data,
            info,
            offsets,
        })
    }

    /// Row counts and index widths.
    #[must_use]
    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    /// Number of rows in `table`.
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.info.get(table).rows
    }

    /// Raw bytes of the 1-based `row` of `table`.
    ///
    /// # Errors
    /// [`crate::Error::OutOfBounds`] if `row` is 0 or past the end of the table.
    pub fn row(&self, table: TableId, row: u32) -> Result<&'a [u8]> {
        if row == 0 || row > self.rows(table) {
            return Err(out_of_bounds_error!());
        }

        let (start, row_size) = self.offsets[table as usize];
        let begin = start + (row as usize - 1) * row_size;
        self.data
            .get(begin..begin + row_size)
            .ok_or_else(|| out_of_bounds_error!())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn stream(valid: &[(TableId, u32)], rows: &[u8]) -> Vec<u8> {
        let mut data = vec![0, 0, 0, 0, 2, 0, 0, 1];
        let bits = valid.iter().fold(0u64, |acc, (table, _)| acc | (1 << *table as u64));
        data.extend_from_slice(&bits.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());

        let mut sorted = valid.to_vec();
        sorted.sort_by_key(|(table, _)| *table as u32);
        for (_, count) in sorted {
            data.extend_from_slice(&count.to_le_bytes());
        }
        data.extend_from_slice(rows);
        data
    }

    #[test]
    fn locates_rows() {
        // Module (10 bytes) then two ModuleRef rows (2 bytes each)
        let mut rows = vec![0xAA; 10];
        rows.extend_from_slice(&[0x01, 0x00, 0x02, 0x00]);
        let data = stream(&[(TableId::Module, 1), (TableId::ModuleRef, 2)], &rows);

        let tables = TablesHeader::from(&data).unwrap();
        assert_eq!(tables.rows(TableId::ModuleRef), 2);
        assert_eq!(tables.row(TableId::Module, 1).unwrap(), &[0xAA; 10]);
        assert_eq!(tables.row(TableId::ModuleRef, 2).unwrap(), &[0x02, 0x00]);

        assert!(matches!(
            tables.row(TableId::ModuleRef, 0),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(tables.row(TableId::ModuleRef, 3).is_err());
        assert!(tables.row(TableId::TypeDef, 1).is_err());
    }

    #[test]
    fn truncated_rows() {
        let data = stream(&[(TableId::Module, 2)], &[0u8; 12]);
        assert!(matches!(
            TablesHeader::from(&data),
            Err(Error::Malformed { .. })
        ));
    }
}
