//! Initial tuning data for a later guided scan.

use dvbscan_si::FrontendType;

use super::{generated_by, is_dumpable, OutputWriter};
use crate::model::Transponder;
use crate::tuning_data::format_line;

/// One line per transponder that was scanned successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TuningDataWriter;

impl OutputWriter for TuningDataWriter {
    fn header(&self, frontend: FrontendType) -> Option<String> {
        Some(format!("{}\n# {} transponders", generated_by(), frontend))
    }

    fn transponder(&self, tp: &Transponder) -> Option<String> {
        if !is_dumpable(tp) {
            return None;
        }
        let line = format_line(&tp.params);
        Some(match &tp.network_name {
            Some(name) => format!("{} # {}", line, name),
            None => line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScanStatus;
    use crate::testing::fixtures::dvbt;
    use crate::tuning_data::parse_line;
    use dvbscan_si::FrontendParameters;

    #[test]
    fn test_only_scanned_transponders() {
        let mut tp = Transponder::new(FrontendParameters::Terrestrial(dvbt(474_000_000)));
        tp.status = ScanStatus::TuningFailed;
        assert_eq!(TuningDataWriter.transponder(&tp), None);

        tp.status = ScanStatus::Scanned;
        tp.network_name = Some("Berlin".into());
        let line = TuningDataWriter.transponder(&tp).unwrap();
        assert_eq!(line, "T 474000000 8MHz 2/3 NONE QAM64 8k 1/4 NONE # Berlin");
        assert_eq!(parse_line(&line).unwrap(), Some(tp.params));
    }

    #[test]
    fn test_header_is_comment() {
        let header = TuningDataWriter.header(FrontendType::Cable).unwrap();
        assert!(header.lines().all(|l| l.starts_with('#')));
    }
}
