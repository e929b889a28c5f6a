/*!

This is the long-form manual for `grant_geocoding` and `convkml`.

## Input formats

The following formats are supported:
* `excel` Excel and OpenDocument workbooks (`.xlsx`, `.xls`, `.ods`)
* `csv` Comma Separated Values (the delimiter can be changed)

Each row is one grant (convênio). The program needs three columns: the agreement
number, the municipality and the state code (UF). A fourth column with the physical
completion percentage is optional.

### Finding the columns

When the table has a header row, the columns are found by matching the header labels:

| field        | patterns (case-insensitive)                              |
|--------------|----------------------------------------------------------|
| agreement    | `conv[êe]nio`, `nº`, `número`, `id`                      |
| municipality | `município`, `cidade`, `localidade`                      |
| state        | `uf`, `estado`, `sigla`                                  |
| completion   | `percentual`, `%`, `executado`, `execução`, `físico`     |

The first header matching a field wins. A column used by one field is not used by another.

When the table has no header row (`--no-header`), the first row is inspected:
* two letters: the state code,
* a value with `%`, or a number between 0 and 100: the completion,
* more than 4 digits: the agreement number,
* any other text longer than 2 characters: the municipality.

These positions are only suggestions. The program prints them and stops, unless
`--accept-detected` is passed.

Any column can be chosen explicitly with `--agreement-column`, `--municipality-column`,
`--state-column` and `--completion-column`. The value is either a 1-based position (`3`),
an Excel column letter (`C`) or a header label (`"Nº Convênio"`).

### Municipality names

Names are upper-cased and the administrative prefixes are removed (`PREFEITURA MUNICIPAL DE`,
`MUNICÍPIO DE`, `PM DE` ...). With `--strict-names`, parenthetical notes and rural tokens
(`GLEBA`, `LOTE`, `DISTRITO DE`, `VILA`) are removed as well.

A blank municipality, or a text such as `GOVERNO DO ESTADO DE ...`, marks a grant to the
state government. It is placed at the capital of the state.

### Execution status

| completion      | marker | label                       |
|-----------------|--------|-----------------------------|
| 0               | blue   | `0% (Não Iniciada)`         |
| up to 80%       | yellow | `xx.x% (Em Execução)`       |
| above 80%       | red    | `xx.x% (Próxima da Conclusão)` |
| not a number    | white  | `Dado inválido`             |

Values between 1 and 100 are read as percentages, values up to 1 as fractions.
Values above 100 are kept as they are (150 reads as 15000%) and a warning is logged.

Grants to a state government always get a red marker.

## Geocoding

Queries have the form `<municipality>, <UF>, Brasil`. Each distinct query is sent once per
run: the answers, including the misses, are kept in memory until the run ends.
Requests are spaced by `--min-delay` seconds (1.1 by default) and retried up to
`--max-attempts` times on timeouts and connection errors.

Backends:
* `nominatim` OpenStreetMap Nominatim (default). Please set a meaningful `--user-agent`.
* `arcgis` ArcGIS World Geocoding service.

## Outputs

* a KML file, one placemark per located grant,
* optionally (`--report`), a CSV audit file with one line per row:
  `row,agreement,query,outcome,detail`.

*/
