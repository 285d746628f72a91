use anyhow::Result;
use std::path::Path;
use tempfile::TempDir;

pub const EXTRACT_COMMA: &str = "\
Seccio_censal,Districte,Municipi,Data,Tipus_us,Numero_de_comptadors,Consum_litres_per_dia
0801901001,1,Barcelona,2023-01-02,Domestic/Residencial,10,1500
0801901002,2,Barcelona,2023-01-01,Comercial,4,900
0801901003,9,Barcelona,2023-01-02,Industrial,x,300
";

pub const EXTRACT_SEMICOLON: &str = "\
DISTRICTE;Data;Tipus_Ús;Secció_censal;MUNICIPI;Numero_de_comptadors;Consum_litres_per_dia
2;2023-01-01;Domestic/Residencial;0801902001;Barcelona;7;1200
1;not-a-date;Comercial;0801902002;Barcelona;3;400
1;2023-01-03;Comercial;0801902003;Barcelona;;
";

pub const LOOKUP: &str = "\
id,nom
1,Ciutat Vella
2,Eixample
";

/// Root with a `tablas_pequenas` subdirectory holding two extracts that
/// differ in delimiter, column order, case and accents.
pub fn sample_root(with_lookup: bool) -> Result<TempDir> {
    let root = TempDir::new()?;
    let data = root.path().join("tablas_pequenas");
    std::fs::create_dir(&data)?;
    std::fs::write(data.join("a_comma.csv"), EXTRACT_COMMA)?;
    std::fs::write(data.join("b_semicolon.csv"), EXTRACT_SEMICOLON)?;
    if with_lookup {
        write_lookup(root.path(), LOOKUP)?;
    }
    Ok(root)
}

pub fn write_lookup(root: &Path, contents: &str) -> Result<()> {
    std::fs::write(root.join("districtes.csv"), contents)?;
    Ok(())
}
